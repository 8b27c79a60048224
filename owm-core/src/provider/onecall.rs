//! One-call endpoint: current weather plus minutely, hourly and daily forecasts in one request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    ApiClient, Config, PollError, PollReport,
    config::{FieldSelection, OneCallSettings},
    meteo::{self, DerivedReading, Observation},
    model::{
        DailySlot, DailyTemperatures, HourlySlot, MinutelySlot, OneCallCurrent, OneCallReading,
        unix_to_utc,
    },
    summary,
};

use super::{
    EndpointId, Precipitation, WeatherCondition, WeatherSource, conditions, decode, location_args,
    wind_kmh,
};

/// Days shown in the forecast table.
const FORECAST_HTML_DAYS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct OneCallSource;

#[async_trait]
impl WeatherSource for OneCallSource {
    fn id(&self) -> EndpointId {
        EndpointId::OneCall
    }

    async fn update(&self, client: &mut ApiClient, config: &Config) -> Result<PollReport, PollError> {
        poll_onecall(client, config)
            .await
            .map(|reading| PollReport::OneCall(Box::new(reading)))
    }
}

pub async fn poll_onecall(
    client: &mut ApiClient,
    config: &Config,
) -> Result<OneCallReading, PollError> {
    config.ensure_valid()?;
    let settings = &config.onecall;

    let mut args = location_args(config)?;
    if let Some(exclude) = exclude_list(settings) {
        args.push(("exclude", exclude));
    }

    let outcome = client.get(settings.api_version.endpoint(), &args).await;
    let raw: OcResponse = decode(outcome.into_data()?)?;
    let reading = map_response(&raw, config);

    tracing::info!(
        temperature = reading.current.observation.temperature,
        minutely = reading.minutely.len(),
        hourly = reading.hourly.len(),
        daily = reading.daily.len(),
        "one-call data updated"
    );
    Ok(reading)
}

/// Blocks the API can leave out because no slot of them is wanted.
pub fn exclude_list(settings: &OneCallSettings) -> Option<String> {
    let mut exclude = Vec::new();
    if settings.minutely_forecast_count == 0 {
        exclude.push("minutely");
    }
    if settings.hourly_forecast_count == 0 {
        exclude.push("hourly");
    }
    if settings.daily_forecast_count == 0 && !settings.with_forecast_html {
        exclude.push("daily");
    }
    (!exclude.is_empty()).then(|| exclude.join(","))
}

fn map_response(raw: &OcResponse, config: &Config) -> OneCallReading {
    let settings = &config.onecall;

    let minutely = raw
        .minutely
        .iter()
        .take(settings.minutely_forecast_count)
        .map(|m| MinutelySlot {
            begin: unix_to_utc(m.dt),
            precipitation: m.precipitation,
        })
        .collect();
    let hourly = raw
        .hourly
        .iter()
        .take(settings.hourly_forecast_count)
        .map(|h| map_hourly(h, config))
        .collect();
    let daily = raw
        .daily
        .iter()
        .take(settings.daily_forecast_count)
        .map(|d| map_daily(d, &config.fields, config.altitude))
        .collect();

    // the table shows what the API delivered, not only the selected fields
    let forecast_html = settings.with_forecast_html.then(|| {
        let all = FieldSelection::all();
        let days: Vec<DailySlot> = raw
            .daily
            .iter()
            .take(FORECAST_HTML_DAYS)
            .map(|d| map_daily(d, &all, config.altitude))
            .collect();
        summary::forecast_table_html(&days)
    });

    OneCallReading {
        current: map_current(&raw.current, config),
        minutely,
        hourly,
        daily,
        forecast_html,
    }
}

fn map_current(raw: &OcCurrent, config: &Config) -> OneCallCurrent {
    let fields = &config.fields;
    let wind_deg = raw.wind_deg as i32;

    let observation = Observation {
        temperature: raw.temp,
        humidity: raw.humidity,
        pressure: raw.pressure,
        wind_speed: wind_kmh(&raw.wind_speed),
        wind_deg,
        altitude: config.altitude,
    };

    // the API delivers these two itself
    let mut derived = observation.derive(fields);
    derived.dewpoint = fields.dewpoint.then_some(raw.dew_point);
    derived.windchill = fields.windchill.then_some(raw.feels_like);

    OneCallCurrent {
        measured_at: unix_to_utc(raw.dt),
        observation,
        derived,
        wind_angle: fields.windangle.then_some(wind_deg),
        wind_gust: gust_kmh(&raw.wind_gust),
        uv_index: fields.uv_index.then_some(raw.uvi),
        rain_1h: Precipitation::one_hour(raw.rain.as_ref()),
        snow_1h: Precipitation::one_hour(raw.snow.as_ref()),
        cloudiness: fields.cloudiness.then_some(raw.clouds),
        conditions: conditions(&raw.weather, fields),
    }
}

fn map_hourly(raw: &OcHourly, config: &Config) -> HourlySlot {
    let fields = &config.fields;
    let wind_speed = wind_kmh(&raw.wind_speed);
    let wind_deg = raw.wind_deg as i32;

    HourlySlot {
        begin: unix_to_utc(raw.dt),
        temperature: raw.temp,
        pressure: raw.pressure,
        absolute_pressure: fields
            .absolute_pressure
            .then(|| meteo::absolute_pressure(raw.pressure, raw.temp, config.altitude)),
        uv_index: raw.uvi,
        humidity: raw.humidity,
        wind_speed,
        wind_angle: fields.windangle.then_some(wind_deg),
        wind_gust: gust_kmh(&raw.wind_gust),
        derived: DerivedReading::wind(wind_speed, wind_deg, fields),
        rain_1h: Precipitation::one_hour(raw.rain.as_ref()),
        snow_1h: Precipitation::one_hour(raw.snow.as_ref()),
        rain_probability: fields.rain_probability.then_some(raw.pop * 100.0),
        cloudiness: fields.cloudiness.then_some(raw.clouds),
        conditions: conditions(&raw.weather, fields),
    }
}

fn map_daily(raw: &OcDaily, fields: &FieldSelection, altitude: f64) -> DailySlot {
    let wind_speed = wind_kmh(&raw.wind_speed);
    let wind_deg = raw.wind_deg as i32;
    let t = &raw.temp;

    DailySlot {
        begin: unix_to_utc(raw.dt),
        temperature: DailyTemperatures {
            morning: t.morn,
            day: t.day,
            evening: t.eve,
            night: t.night,
            min: t.min,
            max: t.max,
        },
        pressure: raw.pressure,
        absolute_pressure: fields
            .absolute_pressure
            .then(|| meteo::absolute_pressure(raw.pressure, t.day, altitude)),
        uv_index: raw.uvi,
        humidity: raw.humidity,
        wind_speed,
        wind_angle: fields.windangle.then_some(wind_deg),
        wind_gust: gust_kmh(&raw.wind_gust),
        derived: DerivedReading::wind(wind_speed, wind_deg, fields),
        rain: raw.rain,
        rain_probability: fields.rain_probability.then_some(raw.pop * 100.0),
        cloudiness: fields.cloudiness.then_some(raw.clouds),
        conditions: conditions(&raw.weather, fields),
    }
}

/// Gusts in km/h, one decimal.
fn gust_kmh(gust: &Value) -> f64 {
    meteo::round_to(meteo::ms_to_kmh(gust).unwrap_or(0.0), 1)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcCurrent {
    dt: i64,
    temp: f64,
    feels_like: f64,
    pressure: f64,
    humidity: f64,
    dew_point: f64,
    uvi: f64,
    clouds: f64,
    wind_speed: Value,
    wind_deg: f64,
    wind_gust: Value,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcMinutely {
    dt: i64,
    precipitation: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcHourly {
    dt: i64,
    temp: f64,
    pressure: f64,
    humidity: f64,
    uvi: f64,
    clouds: f64,
    wind_speed: Value,
    wind_deg: f64,
    wind_gust: Value,
    pop: f64,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcDailyTemp {
    morn: f64,
    day: f64,
    eve: f64,
    night: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcDaily {
    dt: i64,
    temp: OcDailyTemp,
    pressure: f64,
    humidity: f64,
    uvi: f64,
    clouds: f64,
    wind_speed: Value,
    wind_deg: f64,
    wind_gust: Value,
    pop: f64,
    rain: f64,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcResponse {
    current: OcCurrent,
    minutely: Vec<OcMinutely>,
    hourly: Vec<OcHourly>,
    daily: Vec<OcDaily>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> OcResponse {
        decode(json!({
            "current": {
                "dt": 1_700_000_000, "temp": 12.5, "feels_like": 11.1, "pressure": 1015,
                "humidity": 80, "dew_point": 9.2, "uvi": 1.7, "clouds": 40,
                "wind_speed": 4.6, "wind_deg": 348, "wind_gust": 2.57,
                "rain": {"1h": 0.3},
                "weather": [{"id": 802, "description": "scattered clouds", "icon": "03d"}]
            },
            "minutely": [
                {"dt": 1_700_000_060, "precipitation": 0.0},
                {"dt": 1_700_000_120, "precipitation": 0.2}
            ],
            "hourly": [
                {"dt": 1_700_003_600, "temp": 11.0, "pressure": 1014, "humidity": 82,
                 "uvi": 0.5, "clouds": 60, "wind_speed": 3.2, "wind_deg": 200,
                 "wind_gust": 5.0, "pop": 0.2, "rain": {"1h": 0.1}}
            ],
            "daily": [
                {"dt": 1_699_956_000, "temp": {"morn": 7, "day": 12, "eve": 10, "night": 6,
                 "min": 5.5, "max": 12.8}, "pressure": 1013, "humidity": 70, "uvi": 2.1,
                 "clouds": 90, "wind_speed": 5.1, "wind_deg": 90, "pop": 0.6, "rain": 2.4,
                 "weather": [{"id": 500, "description": "light rain", "icon": "10d"}]},
                {"dt": 1_700_042_400, "temp": {"min": 4, "max": 9}, "pop": 0.1}
            ]
        }))
        .unwrap()
    }

    fn config() -> Config {
        Config {
            altitude: 100.0,
            fields: FieldSelection::all(),
            onecall: OneCallSettings {
                minutely_forecast_count: 60,
                hourly_forecast_count: 12,
                daily_forecast_count: 1,
                ..OneCallSettings::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn exclude_list_follows_counts() {
        let mut settings = OneCallSettings::default();
        assert_eq!(exclude_list(&settings).as_deref(), Some("minutely,hourly,daily"));

        settings.with_forecast_html = true;
        assert_eq!(exclude_list(&settings).as_deref(), Some("minutely,hourly"));

        settings.minutely_forecast_count = 10;
        settings.hourly_forecast_count = 10;
        assert_eq!(exclude_list(&settings), None);
    }

    #[test]
    fn current_uses_api_dewpoint_and_feels_like() {
        let reading = map_response(&response(), &config());
        let current = &reading.current;

        assert_eq!(current.derived.dewpoint, Some(9.2));
        assert_eq!(current.derived.windchill, Some(11.1));
        assert_eq!(current.derived.heatindex, Some(12.5));
        assert_eq!(current.derived.absolute_humidity, Some(8.8));
        assert_eq!(current.observation.wind_speed, 16.0);
        assert_eq!(current.derived.compass_text.as_deref(), Some("NNW (348°)"));
        assert_eq!(current.wind_gust, 9.3);
        assert_eq!(current.uv_index, Some(1.7));
        assert_eq!(current.rain_1h, 0.3);
        assert_eq!(current.cloudiness, Some(40.0));
    }

    #[test]
    fn slots_are_capped_by_count_and_data() {
        let reading = map_response(&response(), &config());

        assert_eq!(reading.minutely.len(), 2);
        assert_eq!(reading.minutely[1].precipitation, 0.2);
        assert_eq!(reading.hourly.len(), 1);
        assert_eq!(reading.daily.len(), 1);
        assert_eq!(reading.forecast_html, None);
    }

    #[test]
    fn slot_absolute_pressure_uses_slot_values() {
        let reading = map_response(&response(), &config());

        let hour = &reading.hourly[0];
        let expected = meteo::absolute_pressure(1014.0, 11.0, 100.0);
        assert_eq!(hour.absolute_pressure, Some(expected));
        assert_eq!(hour.wind_speed, 11.0);
        assert_eq!(hour.wind_gust, 18.0);
        assert_eq!(hour.rain_1h, 0.1);
        assert!((hour.rain_probability.unwrap_or_default() - 20.0).abs() < 1e-9);

        let day = &reading.daily[0];
        assert_eq!(day.temperature.min, 5.5);
        assert_eq!(day.temperature.day, 12.0);
        assert_eq!(day.absolute_pressure, Some(meteo::absolute_pressure(1013.0, 12.0, 100.0)));
        assert_eq!(day.wind_speed, 18.0);
        assert_eq!(day.derived.beaufort_text.as_deref(), Some("Gentle breeze"));
        assert_eq!(day.rain, 2.4);
    }

    #[test]
    fn forecast_html_takes_two_days_regardless_of_count() {
        let mut cfg = config();
        cfg.onecall.daily_forecast_count = 0;
        cfg.onecall.with_forecast_html = true;

        let reading = map_response(&response(), &cfg);
        assert!(reading.daily.is_empty());

        let html = reading.forecast_html.unwrap_or_default();
        assert_eq!(html.matches("<tr>").count(), 2);
        assert!(html.contains("light rain"));
    }

    #[test]
    fn forecast_html_ignores_the_field_selection() {
        let mut cfg = config();
        cfg.fields = FieldSelection::default();
        cfg.onecall.with_forecast_html = true;

        let reading = map_response(&response(), &cfg);
        assert_eq!(reading.daily[0].cloudiness, None);
        assert_eq!(reading.daily[0].conditions.icon, None);

        let html = reading.forecast_html.unwrap_or_default();
        assert!(html.contains("light rain (90%)"));
        assert!(html.contains("<img src=\"http://openweathermap.org/img/w/10d.png\">"));
        assert!(html.contains("60% 2.4 mm"));
        assert!(!html.contains("/img/w/.png"));
    }
}
