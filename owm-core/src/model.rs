use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meteo::{DerivedReading, Observation};

/// Textual weather conditions of one slot. Each part is present only when selected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// All descriptions joined with `", "`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// `data/2.5/weather`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub measured_at: DateTime<Utc>,
    pub observation: Observation,
    pub derived: DerivedReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_angle: Option<i32>,
    /// mm
    pub rain_3h: f64,
    /// mm
    pub snow_3h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudiness: Option<f64>,
    pub conditions: Conditions,
}

/// One 3-hour slot of `data/2.5/forecast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSlot {
    pub begin: DateTime<Utc>,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// Ground level pressure.
    pub pressure: f64,
    /// Sea level pressure as reported by the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_pressure: Option<f64>,
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_angle: Option<i32>,
    pub derived: DerivedReading,
    pub rain_3h: f64,
    pub snow_3h: f64,
    /// Percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudiness: Option<f64>,
    pub conditions: Conditions,
}

/// Current weather and the 3-hour forecast, polled together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReading {
    pub current: CurrentReading,
    pub forecast: Vec<ForecastSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_condition_html: Option<String>,
}

/// Current block of the one-call endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneCallCurrent {
    pub measured_at: DateTime<Utc>,
    pub observation: Observation,
    pub derived: DerivedReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_angle: Option<i32>,
    /// km/h
    pub wind_gust: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
    pub rain_1h: f64,
    pub snow_1h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudiness: Option<f64>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinutelySlot {
    pub begin: DateTime<Utc>,
    /// mm/h
    pub precipitation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySlot {
    pub begin: DateTime<Utc>,
    pub temperature: f64,
    pub pressure: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_pressure: Option<f64>,
    pub uv_index: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_angle: Option<i32>,
    pub wind_gust: f64,
    pub derived: DerivedReading,
    pub rain_1h: f64,
    pub snow_1h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudiness: Option<f64>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyTemperatures {
    pub morning: f64,
    pub day: f64,
    pub evening: f64,
    pub night: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySlot {
    pub begin: DateTime<Utc>,
    pub temperature: DailyTemperatures,
    pub pressure: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_pressure: Option<f64>,
    pub uv_index: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_angle: Option<i32>,
    pub wind_gust: f64,
    pub derived: DerivedReading,
    /// mm over the whole day.
    pub rain: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudiness: Option<f64>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneCallReading {
    pub current: OneCallCurrent,
    pub minutely: Vec<MinutelySlot>,
    pub hourly: Vec<HourlySlot>,
    pub daily: Vec<DailySlot>,
    /// Two-day table, see [`crate::summary::forecast_table_html`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_html: Option<String>,
}

/// Result of one successful [`WeatherSource::update`](crate::provider::WeatherSource::update).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "endpoint", rename_all = "snake_case")]
pub enum PollReport {
    Data(Box<DataReading>),
    OneCall(Box<OneCallReading>),
}

impl PollReport {
    pub fn measured_at(&self) -> DateTime<Utc> {
        match self {
            PollReport::Data(r) => r.current.measured_at,
            PollReport::OneCall(r) => r.current.measured_at,
        }
    }
}

/// Unix seconds to UTC; out of range values fall back to the epoch.
pub(crate) fn unix_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
