use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::error::{PollError, Status};
use crate::stats::DEFAULT_HISTORY_SIZE;

pub const MAX_THREE_HOUR_FORECAST: usize = 40;
pub const MAX_MINUTELY_FORECAST: usize = 60;
pub const MAX_HOURLY_FORECAST: usize = 48;
pub const MAX_DAILY_FORECAST: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Query arguments in the format the API expects (six decimals).
    pub fn query_args(&self) -> [(&'static str, String); 2] {
        [
            ("lat", format!("{:.6}", self.latitude)),
            ("lon", format!("{:.6}", self.longitude)),
        ]
    }
}

/// Optional values a poll should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSelection {
    pub absolute_pressure: bool,
    pub absolute_humidity: bool,
    pub dewpoint: bool,
    pub windchill: bool,
    pub heatindex: bool,
    pub uv_index: bool,
    pub windstrength: bool,
    pub windstrength_text: bool,
    pub windangle: bool,
    pub winddirection: bool,
    pub rain_probability: bool,
    pub cloudiness: bool,
    pub conditions: bool,
    pub icon: bool,
    pub condition_id: bool,
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self {
            absolute_pressure: false,
            absolute_humidity: false,
            dewpoint: false,
            windchill: false,
            heatindex: false,
            uv_index: false,
            windstrength: false,
            windstrength_text: false,
            windangle: true,
            winddirection: false,
            rain_probability: false,
            cloudiness: false,
            conditions: false,
            icon: false,
            condition_id: false,
        }
    }
}

impl FieldSelection {
    pub fn all() -> Self {
        Self {
            absolute_pressure: true,
            absolute_humidity: true,
            dewpoint: true,
            windchill: true,
            heatindex: true,
            uv_index: true,
            windstrength: true,
            windstrength_text: true,
            windangle: true,
            winddirection: true,
            rain_probability: true,
            cloudiness: true,
            conditions: true,
            icon: true,
            condition_id: true,
        }
    }
}

/// Current weather + 3-hour forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub hourly_forecast_count: usize,
    pub with_summary: bool,
    pub with_current_condition: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OneCallVersion {
    #[default]
    #[serde(rename = "2.5")]
    V2_5,
    #[serde(rename = "3.0")]
    V3_0,
}

impl OneCallVersion {
    pub fn endpoint(self) -> &'static str {
        match self {
            OneCallVersion::V2_5 => "data/2.5/onecall",
            OneCallVersion::V3_0 => "data/3.0/onecall",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneCallSettings {
    pub api_version: OneCallVersion,
    pub minutely_forecast_count: usize,
    pub hourly_forecast_count: usize,
    pub daily_forecast_count: usize,
    pub with_forecast_html: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    /// Assigned by the API on registration.
    pub station_id: Option<String>,
    pub external_id: String,
    pub name: String,
    /// Minutes between two transmissions; 0 disables the timer.
    pub transmit_interval: u32,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            station_id: None,
            external_id: String::new(),
            name: String::new(),
            transmit_interval: 5,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// appid = "..."
/// altitude = 120.0
///
/// [location]
/// latitude = 51.5
/// longitude = 7.4
///
/// [fields]
/// dewpoint = true
///
/// [data]
/// hourly_forecast_count = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub disabled: bool,
    /// OpenWeatherMap API key.
    pub appid: Option<String>,
    /// Language code for textual conditions; falls back to `$LANG`.
    pub lang: Option<String>,
    pub location: Option<Coordinates>,
    /// Host-wide location, used when `location` is not set.
    pub system_location: Option<Coordinates>,
    /// Meters above sea level.
    pub altitude: f64,
    /// Minutes between two polls; 0 disables polling.
    pub update_interval: u32,
    pub history_size: usize,
    pub fields: FieldSelection,
    pub data: DataSettings,
    pub onecall: OneCallSettings,
    pub station: StationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disabled: false,
            appid: None,
            lang: None,
            location: None,
            system_location: None,
            altitude: 0.0,
            update_interval: 15,
            history_size: DEFAULT_HISTORY_SIZE,
            fields: FieldSelection::default(),
            data: DataSettings::default(),
            onecall: OneCallSettings::default(),
            station: StationSettings::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "openweathermap", "owm")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        let key = api_key.trim().to_string();
        self.appid = (!key.is_empty()).then_some(key);
    }

    pub fn api_key(&self) -> Result<&str, PollError> {
        self.appid
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PollError::InvalidConfig("API key must be specified".to_string()))
    }

    /// Configured location, else the host-wide one.
    pub fn coordinates(&self) -> Result<Coordinates, PollError> {
        self.location.or(self.system_location).ok_or_else(|| {
            PollError::InvalidConfig("no location configured and no system location".to_string())
        })
    }

    pub fn effective_lang(&self) -> Option<String> {
        match self.lang.as_deref().map(str::trim) {
            Some("") => None,
            Some(lang) => Some(lang.to_string()),
            None => std::env::var("LANG").ok().and_then(|v| lang_from_locale(&v)),
        }
    }

    pub fn update_interval(&self) -> Option<Duration> {
        (self.update_interval > 0).then(|| Duration::from_secs(u64::from(self.update_interval) * 60))
    }

    pub fn transmit_interval(&self) -> Option<Duration> {
        let minutes = self.station.transmit_interval;
        (minutes > 0).then(|| Duration::from_secs(u64::from(minutes) * 60))
    }

    /// Everything that keeps this configuration from being usable.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.api_key().is_err() {
            problems.push("API key must be specified".to_string());
        }

        let limits = [
            ("3-hour forecast", self.data.hourly_forecast_count, MAX_THREE_HOUR_FORECAST),
            ("minutely forecast", self.onecall.minutely_forecast_count, MAX_MINUTELY_FORECAST),
            ("hourly forecast", self.onecall.hourly_forecast_count, MAX_HOURLY_FORECAST),
            ("daily forecast", self.onecall.daily_forecast_count, MAX_DAILY_FORECAST),
        ];
        for (what, count, max) in limits {
            if count > max {
                problems.push(format!("{what} count {count} exceeds the maximum of {max}"));
            }
        }

        problems
    }

    /// Status the instance starts in after this configuration was applied.
    pub fn initial_status(&self) -> Status {
        if self.disabled {
            Status::Inactive
        } else if !self.check().is_empty() {
            Status::InvalidConfig
        } else {
            Status::Active
        }
    }

    pub(crate) fn ensure_valid(&self) -> Result<(), PollError> {
        match self.check().into_iter().next() {
            Some(problem) => Err(PollError::InvalidConfig(problem)),
            None => Ok(()),
        }
    }
}

/// `de_DE.UTF-8` -> `de`
fn lang_from_locale(locale: &str) -> Option<String> {
    let (lang, _) = locale.split_once('_')?;
    (!lang.is_empty() && lang.chars().all(|c| c.is_ascii_lowercase())).then(|| lang.to_string())
}
