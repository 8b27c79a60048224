//! Personal weather station API (`data/3.0/measurements`, `data/3.0/stations`).
//!
//! Unlike the fetchers, every call here accepts any `2xx` and an empty body.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ApiClient, Config, PollError, http::ResponsePolicy};

use super::decode;

const MEASUREMENTS_CMD: &str = "data/3.0/measurements";
const STATIONS_CMD: &str = "data/3.0/stations";

pub const DEFAULT_FETCH_LIMIT: u32 = 100;

/// One set of readings to transmit. Unset values are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unix seconds; the time of transmission when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// m/s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_1h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_6h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snow_1h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snow_6h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snow_24h: Option<f64>,
}

#[derive(Debug, Serialize)]
struct StationMeasurement<'a> {
    station_id: &'a str,
    #[serde(flatten)]
    measurement: Measurement,
}

/// Granularity of [`fetch_measurements`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    #[default]
    #[serde(rename = "m")]
    Minute,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Minute => "m",
            Aggregation::Hour => "h",
            Aggregation::Day => "d",
        }
    }
}

impl TryFrom<&str> for Aggregation {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "m" => Ok(Aggregation::Minute),
            "h" => Ok(Aggregation::Hour),
            "d" => Ok(Aggregation::Day),
            _ => Err(anyhow::anyhow!(
                "Unknown aggregation '{value}'. Supported: m (minute), h (hour), d (day)."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub aggregation: Aggregation,
    pub limit: u32,
}

impl Default for MeasurementQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            aggregation: Aggregation::default(),
            limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

impl MeasurementQuery {
    /// `to` defaults to `now`; a missing `from`, or one after `to`, means the 24 hours before `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = match self.from {
            Some(from) if from <= to => from,
            _ => now - Duration::hours(24),
        };
        (from, to)
    }
}

/// A registered station as the API describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Station {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,
    pub external_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub rank: i64,
}

/// Send one measurement of the configured station. Returns the time of transmission.
pub async fn transmit_measurements(
    client: &mut ApiClient,
    config: &Config,
    measurement: &Measurement,
) -> Result<DateTime<Utc>, PollError> {
    let station_id = station_id(config)?;
    let now = Utc::now();

    let mut measurement = measurement.clone();
    measurement.dt.get_or_insert(now.timestamp());
    let entry = StationMeasurement {
        station_id,
        measurement,
    };
    let body = json!([entry]);

    client
        .send(
            Method::POST,
            MEASUREMENTS_CMD,
            &[],
            Some(&body),
            ResponsePolicy::TRANSMIT,
        )
        .await
        .into_result()?;

    tracing::info!(station_id, "measurement transmitted");
    Ok(now)
}

/// Aggregated measurements of the configured station, as returned by the API.
pub async fn fetch_measurements(
    client: &mut ApiClient,
    config: &Config,
    query: &MeasurementQuery,
) -> Result<Value, PollError> {
    let station_id = station_id(config)?;
    let (from, to) = query.window(Utc::now());

    let args = [
        ("station_id", station_id.to_string()),
        ("type", query.aggregation.as_str().to_string()),
        ("limit", query.limit.to_string()),
        ("from", from.timestamp().to_string()),
        ("to", to.timestamp().to_string()),
    ];

    let data = client
        .send(Method::GET, MEASUREMENTS_CMD, &args, None, ResponsePolicy::TRANSMIT)
        .await
        .into_result()?;
    Ok(data.unwrap_or_else(|| Value::Array(Vec::new())))
}

/// Register the configured station. Fails if a station id is already configured.
pub async fn register_station(
    client: &mut ApiClient,
    config: &Config,
) -> Result<Station, PollError> {
    config.api_key()?;
    if let Some(id) = configured_id(config) {
        return Err(PollError::InvalidConfig(format!(
            "station is already registered as {id}"
        )));
    }

    let body = station_body(config)?;
    let data = client
        .send(Method::POST, STATIONS_CMD, &[], Some(&body), ResponsePolicy::TRANSMIT)
        .await
        .into_data()?;

    let station: Station = decode(data)?;
    tracing::info!(station_id = %station.id, "station registered");
    Ok(station)
}

/// Push name, external id and location of the configured station.
pub async fn update_station(
    client: &mut ApiClient,
    config: &Config,
) -> Result<Option<Station>, PollError> {
    let station_id = station_id(config)?;
    let body = station_body(config)?;
    let cmd = format!("{STATIONS_CMD}/{station_id}");

    let data = client
        .send(Method::PUT, &cmd, &[], Some(&body), ResponsePolicy::TRANSMIT)
        .await
        .into_result()?;

    data.map(decode::<Station>).transpose()
}

pub async fn list_stations(
    client: &mut ApiClient,
    config: &Config,
) -> Result<Vec<Station>, PollError> {
    config.api_key()?;

    let data = client
        .send(Method::GET, STATIONS_CMD, &[], None, ResponsePolicy::TRANSMIT)
        .await
        .into_result()?;

    data.map_or_else(|| Ok(Vec::new()), decode)
}

/// Delete any station of the account, not only the configured one.
pub async fn delete_station(
    client: &mut ApiClient,
    config: &Config,
    station_id: &str,
) -> Result<(), PollError> {
    config.api_key()?;
    if station_id.trim().is_empty() {
        return Err(PollError::InvalidConfig("station id must be specified".to_string()));
    }

    let cmd = format!("{STATIONS_CMD}/{}", station_id.trim());
    client
        .send(Method::DELETE, &cmd, &[], None, ResponsePolicy::TRANSMIT)
        .await
        .into_result()?;

    tracing::info!(station_id, "station deleted");
    Ok(())
}

fn configured_id(config: &Config) -> Option<&str> {
    config
        .station
        .station_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn station_id(config: &Config) -> Result<&str, PollError> {
    config.api_key()?;
    configured_id(config).ok_or_else(|| {
        PollError::InvalidConfig("station is not registered (no station id)".to_string())
    })
}

fn station_body(config: &Config) -> Result<Value, PollError> {
    let location = config.coordinates()?;
    Ok(json!({
        "external_id": config.station.external_id,
        "name": config.station.name,
        "latitude": location.latitude,
        "longitude": location.longitude,
        "altitude": config.altitude,
    }))
}
