use crate::{
    ApiClient, Config, PollError, PollReport,
    config::FieldSelection,
    meteo,
    model::Conditions,
    provider::{current::DataSource, onecall::OneCallSource},
    stats::{ApiLimit, LimitUnit},
};
use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use std::{convert::TryFrom, fmt::Debug};

pub mod current;
pub mod onecall;
pub mod station;

/// The three OpenWeatherMap endpoint families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId {
    Data,
    OneCall,
    Station,
}

impl EndpointId {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointId::Data => "data",
            EndpointId::OneCall => "onecall",
            EndpointId::Station => "station",
        }
    }

    pub const fn all() -> &'static [EndpointId] {
        &[EndpointId::Data, EndpointId::OneCall, EndpointId::Station]
    }

    /// Free-tier quota.
    pub fn limits(&self) -> &'static [ApiLimit] {
        const DATA: &[ApiLimit] = &[
            ApiLimit { value: 60, unit: LimitUnit::Minute },
            ApiLimit { value: 1_000_000, unit: LimitUnit::Month },
        ];
        const ONECALL: &[ApiLimit] = &[ApiLimit { value: 1000, unit: LimitUnit::Day }];

        match self {
            EndpointId::Data => DATA,
            EndpointId::OneCall => ONECALL,
            EndpointId::Station => &[],
        }
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EndpointId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "data" => Ok(EndpointId::Data),
            "onecall" => Ok(EndpointId::OneCall),
            "station" => Ok(EndpointId::Station),
            _ => Err(anyhow::anyhow!(
                "Unknown endpoint '{value}'. Supported endpoints: data, onecall, station."
            )),
        }
    }
}

/// An endpoint that can be polled for weather on a timer.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    fn id(&self) -> EndpointId;

    /// One complete poll. On error nothing is returned, so callers keep their last reading.
    async fn update(&self, client: &mut ApiClient, config: &Config) -> Result<PollReport, PollError>;
}

pub fn source_for(id: EndpointId) -> anyhow::Result<Box<dyn WeatherSource>> {
    let boxed: Box<dyn WeatherSource> = match id {
        EndpointId::Data => Box::new(DataSource),
        EndpointId::OneCall => Box::new(OneCallSource),
        EndpointId::Station => {
            return Err(anyhow::anyhow!(
                "Endpoint '{id}' only transmits measurements and cannot be polled for weather."
            ));
        }
    };

    Ok(boxed)
}

/// Client for `id`, carrying the configured key, history size and quota.
pub fn client_from_config(id: EndpointId, config: &Config) -> anyhow::Result<ApiClient> {
    let api_key = config.api_key().map_err(|_| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `owm configure` and enter your OpenWeatherMap API key."
        )
    })?;

    let mut client = ApiClient::new(api_key)?.with_history_size(config.history_size);
    client.stats_mut().set_limits(id.limits());
    Ok(client)
}

/// `lat`, `lon`, `units` and the optional `lang` every weather request carries.
pub(crate) fn location_args(config: &Config) -> Result<Vec<(&'static str, String)>, PollError> {
    let mut args = Vec::from(config.coordinates()?.query_args());
    args.push(("units", "metric".to_string()));
    if let Some(lang) = config.effective_lang() {
        args.push(("lang", lang));
    }
    Ok(args)
}

pub(crate) fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, PollError> {
    serde_json::from_value(value)
        .map_err(|e| PollError::InvalidData(format!("malformed response ({e})")))
}

/// Element of the `weather` array every endpoint returns.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WeatherCondition {
    id: i64,
    description: String,
    icon: String,
}

impl WeatherCondition {
    pub(crate) fn icon(&self) -> &str {
        &self.icon
    }
}

pub(crate) fn conditions(weather: &[WeatherCondition], fields: &FieldSelection) -> Conditions {
    let first = weather.first();

    let text = fields.conditions.then(|| {
        weather
            .iter()
            .map(|w| w.description.as_str())
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    });
    let icon = fields
        .icon
        .then(|| first.map(|w| w.icon.clone()).unwrap_or_default());
    let id = if fields.condition_id { first.map(|w| w.id) } else { None };

    Conditions { text, icon, id }
}

/// Wind speed from m/s to whole km/h, truncated. Unusable values count as calm.
pub(crate) fn wind_kmh(speed: &serde_json::Value) -> f64 {
    meteo::ms_to_kmh(speed).unwrap_or(0.0).trunc()
}

/// Optional `{"1h": ..}` / `{"3h": ..}` precipitation blocks.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Precipitation {
    #[serde(rename = "1h")]
    one_hour: f64,
    #[serde(rename = "3h")]
    three_hours: f64,
}

impl Precipitation {
    pub(crate) fn one_hour(block: Option<&Self>) -> f64 {
        block.map_or(0.0, |p| p.one_hour)
    }

    pub(crate) fn three_hours(block: Option<&Self>) -> f64 {
        block.map_or(0.0, |p| p.three_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_id_as_str_roundtrip() {
        for id in EndpointId::all() {
            let s = id.as_str();
            let parsed = EndpointId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
        assert_eq!(EndpointId::try_from("OneCall").unwrap(), EndpointId::OneCall);
    }

    #[test]
    fn unknown_endpoint_error() {
        let err = EndpointId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown endpoint"));
    }

    #[test]
    fn station_is_not_a_weather_source() {
        assert_eq!(source_for(EndpointId::Data).unwrap().id(), EndpointId::Data);
        assert_eq!(source_for(EndpointId::OneCall).unwrap().id(), EndpointId::OneCall);
        assert!(source_for(EndpointId::Station).is_err());
    }

    #[test]
    fn client_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = client_from_config(EndpointId::Data, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn client_from_config_carries_the_quota() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());

        let client = client_from_config(EndpointId::OneCall, &cfg).unwrap();
        assert_eq!(client.stats().limits()[0].to_string(), "1000 calls/day");
    }

    #[test]
    fn conditions_join_descriptions() {
        let weather: Vec<WeatherCondition> = serde_json::from_value(json!([
            {"id": 500, "description": "light rain", "icon": "10d"},
            {"id": 701, "description": ""},
            {"id": 741, "description": "fog", "icon": "50d"}
        ]))
        .unwrap();

        let c = conditions(&weather, &FieldSelection::all());
        assert_eq!(c.text.as_deref(), Some("light rain, fog"));
        assert_eq!(c.icon.as_deref(), Some("10d"));
        assert_eq!(c.id, Some(500));

        let none = conditions(&weather, &FieldSelection::default());
        assert_eq!(none, Conditions::default());
    }

    #[test]
    fn location_args_need_a_location() {
        let mut cfg = Config {
            lang: Some("de".into()),
            ..Config::default()
        };
        assert_eq!(
            location_args(&cfg).unwrap_err().status(),
            crate::Status::InvalidConfig
        );

        cfg.system_location = Some(crate::config::Coordinates {
            latitude: 51.5,
            longitude: 7.25,
        });
        let args = location_args(&cfg).unwrap();
        assert_eq!(
            args,
            vec![
                ("lat", "51.500000".to_string()),
                ("lon", "7.250000".to_string()),
                ("units", "metric".to_string()),
                ("lang", "de".to_string()),
            ]
        );
    }

    #[test]
    fn decode_failure_is_invalid_data() {
        let err = decode::<Vec<i64>>(json!({"a": 1})).unwrap_err();
        assert_eq!(err.status(), crate::Status::InvalidData);
        assert!(err.message().starts_with("malformed response"));
    }

    #[test]
    fn wind_speed_is_truncated() {
        assert_eq!(wind_kmh(&json!(5.1)), 18.0);
        assert_eq!(wind_kmh(&json!("3.2")), 11.0);
        assert_eq!(wind_kmh(&json!(null)), 0.0);
    }
}
