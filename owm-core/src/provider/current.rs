//! Current weather (`data/2.5/weather`) and the 3-hour forecast (`data/2.5/forecast`).

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    ApiClient, Config, PollError, PollReport,
    config::FieldSelection,
    meteo::{DerivedReading, Observation},
    model::{CurrentReading, DataReading, ForecastSlot, unix_to_utc},
    summary,
};

use super::{
    EndpointId, Precipitation, WeatherCondition, WeatherSource, conditions, decode, location_args,
    wind_kmh,
};

const CURRENT_CMD: &str = "data/2.5/weather";
const FORECAST_CMD: &str = "data/2.5/forecast";

#[derive(Debug, Clone, Copy, Default)]
pub struct DataSource;

#[async_trait]
impl WeatherSource for DataSource {
    fn id(&self) -> EndpointId {
        EndpointId::Data
    }

    async fn update(&self, client: &mut ApiClient, config: &Config) -> Result<PollReport, PollError> {
        poll_data(client, config)
            .await
            .map(|reading| PollReport::Data(Box::new(reading)))
    }
}

/// Current weather, then the forecast. Fails as a whole if either request fails.
///
/// The HTML summaries always show the values the API delivered, whatever the field selection.
pub async fn poll_data(client: &mut ApiClient, config: &Config) -> Result<DataReading, PollError> {
    let raw_current = fetch_current(client, config).await?;
    let raw_forecast = fetch_forecast(client, config).await?;

    let fields = &config.fields;
    let current = map_current(&raw_current, fields, config.altitude);
    let forecast: Vec<ForecastSlot> = raw_forecast
        .iter()
        .map(|entry| map_forecast_entry(entry, fields))
        .collect();

    let summary_html = config.data.with_summary.then(|| {
        let all = FieldSelection::all();
        let current = map_current(&raw_current, &all, config.altitude);
        let forecast: Vec<ForecastSlot> = raw_forecast
            .iter()
            .map(|entry| map_forecast_entry(entry, &all))
            .collect();
        summary::weather_summary_html(&current, &forecast, &Local::now())
    });
    let current_condition_html = config.data.with_current_condition.then(|| {
        let icon = raw_current
            .weather
            .first()
            .map(WeatherCondition::icon)
            .unwrap_or_default();
        summary::current_condition_html(icon)
    });

    Ok(DataReading {
        current,
        forecast,
        summary_html,
        current_condition_html,
    })
}

pub async fn poll_current(
    client: &mut ApiClient,
    config: &Config,
) -> Result<CurrentReading, PollError> {
    let raw = fetch_current(client, config).await?;
    Ok(map_current(&raw, &config.fields, config.altitude))
}

/// The first `data.hourly_forecast_count` slots; no request at all when the count is 0.
pub async fn poll_forecast(
    client: &mut ApiClient,
    config: &Config,
) -> Result<Vec<ForecastSlot>, PollError> {
    let raw = fetch_forecast(client, config).await?;
    Ok(raw
        .iter()
        .map(|entry| map_forecast_entry(entry, &config.fields))
        .collect())
}

async fn fetch_current(
    client: &mut ApiClient,
    config: &Config,
) -> Result<OwCurrentResponse, PollError> {
    config.ensure_valid()?;
    let args = location_args(config)?;

    let raw: OwCurrentResponse = decode(client.get(CURRENT_CMD, &args).await.into_data()?)?;

    tracing::info!(
        temperature = raw.main.temp,
        measured_at = %unix_to_utc(raw.dt),
        "current weather updated"
    );
    Ok(raw)
}

async fn fetch_forecast(
    client: &mut ApiClient,
    config: &Config,
) -> Result<Vec<OwForecastEntry>, PollError> {
    config.ensure_valid()?;
    let count = config.data.hourly_forecast_count;
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut args = location_args(config)?;
    args.push(("cnt", count.to_string()));

    let raw: OwForecastResponse = decode(client.get(FORECAST_CMD, &args).await.into_data()?)?;
    let entries: Vec<OwForecastEntry> = raw.list.into_iter().take(count).collect();

    if entries.len() < count {
        tracing::debug!(requested = count, received = entries.len(), "short forecast list");
    }
    tracing::info!(slots = entries.len(), "3-hour forecast updated");
    Ok(entries)
}

fn map_current(raw: &OwCurrentResponse, fields: &FieldSelection, altitude: f64) -> CurrentReading {
    let wind_deg = raw.wind.deg as i32;

    let observation = Observation {
        temperature: raw.main.temp,
        humidity: raw.main.humidity,
        pressure: raw.main.pressure,
        wind_speed: wind_kmh(&raw.wind.speed),
        wind_deg,
        altitude,
    };

    CurrentReading {
        measured_at: unix_to_utc(raw.dt),
        derived: observation.derive(fields),
        observation,
        wind_angle: fields.windangle.then_some(wind_deg),
        rain_3h: Precipitation::three_hours(raw.rain.as_ref()),
        snow_3h: Precipitation::three_hours(raw.snow.as_ref()),
        cloudiness: fields.cloudiness.then_some(raw.clouds.all),
        conditions: conditions(&raw.weather, fields),
    }
}

fn map_forecast_entry(entry: &OwForecastEntry, fields: &FieldSelection) -> ForecastSlot {
    let wind_speed = wind_kmh(&entry.wind.speed);
    let wind_deg = entry.wind.deg as i32;

    ForecastSlot {
        begin: unix_to_utc(entry.dt),
        temperature_min: entry.main.temp_min,
        temperature_max: entry.main.temp_max,
        pressure: entry.main.grnd_level,
        absolute_pressure: fields.absolute_pressure.then_some(entry.main.sea_level),
        humidity: entry.main.humidity,
        wind_speed,
        wind_angle: fields.windangle.then_some(wind_deg),
        derived: DerivedReading::wind(wind_speed, wind_deg, fields),
        rain_3h: Precipitation::three_hours(entry.rain.as_ref()),
        snow_3h: Precipitation::three_hours(entry.snow.as_ref()),
        rain_probability: fields.rain_probability.then_some(entry.pop * 100.0),
        cloudiness: fields.cloudiness.then_some(entry.clouds.all),
        conditions: conditions(&entry.weather, fields),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: f64,
    sea_level: f64,
    grnd_level: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWind {
    speed: Value,
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    wind: OwWind,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
    clouds: OwClouds,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    wind: OwWind,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
    pop: f64,
    clouds: OwClouds,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}
