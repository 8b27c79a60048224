//! Fetch, classify, decode and derive against a mock OpenWeatherMap server.

use owm_core::{
    ApiClient, Config, Coordinates, EndpointId, FieldSelection, PollReport, Status,
    config::OneCallVersion,
    meteo,
    provider::{
        current, source_for,
        station::{self, Measurement, MeasurementQuery},
    },
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CURRENT: &str = include_str!("fixtures/current.json");
const FORECAST: &str = include_str!("fixtures/forecast.json");
const ONECALL: &str = include_str!("fixtures/onecall.json");

fn fixture(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/json")
}

fn test_config() -> Config {
    let mut cfg = Config {
        lang: Some("en".into()),
        location: Some(Coordinates {
            latitude: 51.5,
            longitude: 7.25,
        }),
        altitude: 100.0,
        fields: FieldSelection::all(),
        ..Config::default()
    };
    cfg.set_api_key("test-key".into());
    cfg.data.hourly_forecast_count = 2;
    cfg
}

async fn mount_current(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "test-key"))
        .and(query_param("lat", "51.500000"))
        .and(query_param("lon", "7.250000"))
        .and(query_param("units", "metric"))
        .and(query_param("lang", "en"))
        .respond_with(fixture(CURRENT))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn data_pipeline_derives_all_selected_values() {
    let server = MockServer::start().await;
    mount_current(&server).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("cnt", "2"))
        .respond_with(fixture(FORECAST))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.data.with_summary = true;
    cfg.data.with_current_condition = true;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let reading = current::poll_data(&mut client, &cfg).await.unwrap();

    let now = &reading.current;
    assert_eq!(now.measured_at.timestamp(), 1_700_000_000);
    assert_eq!(now.observation.temperature, 12.5);
    assert_eq!(now.observation.wind_speed, 18.0);
    assert_eq!(now.derived.dewpoint, Some(9.0));
    assert_eq!(now.derived.absolute_humidity, Some(8.8));
    assert_eq!(now.derived.windchill, Some(10.7));
    assert_eq!(now.derived.heatindex, Some(12.5));
    assert_eq!(now.derived.beaufort_force, Some(3));
    assert_eq!(now.derived.beaufort_text.as_deref(), Some("Gentle breeze"));
    assert_eq!(now.derived.compass_text.as_deref(), Some("SSW (200°)"));
    let abs = now.derived.absolute_pressure.unwrap_or_default();
    assert!((abs - 1002.9206).abs() < 1e-3);
    assert_eq!(now.conditions.text.as_deref(), Some("light rain, fog"));
    assert_eq!(now.rain_3h, 0.4);

    assert_eq!(reading.forecast.len(), 2);
    let second = &reading.forecast[1];
    assert_eq!(second.wind_speed, 9.0);
    assert_eq!(second.derived.compass_text.as_deref(), Some("NNW (348°)"));
    assert_eq!(second.absolute_pressure, Some(1017.0));
    assert_eq!(second.rain_probability, Some(0.0));

    let summary = reading.summary_html.unwrap_or_default();
    assert_eq!(summary.matches("<td align=\"center\"").count(), 3);
    assert_eq!(
        reading.current_condition_html.as_deref(),
        Some("<img src=\"http://openweathermap.org/img/w/10d.png\">")
    );

    assert_eq!(client.stats().total(), 2);
    assert_eq!(client.stats().failed(), 0);
}

#[tokio::test]
async fn summaries_show_api_values_whatever_the_selection() {
    let server = MockServer::start().await;
    mount_current(&server).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(fixture(FORECAST))
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.fields = FieldSelection::default();
    cfg.data.with_summary = true;
    cfg.data.with_current_condition = true;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let reading = current::poll_data(&mut client, &cfg).await.unwrap();

    assert_eq!(reading.current.cloudiness, None);
    assert_eq!(reading.current.conditions.icon, None);

    let summary = reading.summary_html.unwrap_or_default();
    assert!(summary.contains("http://openweathermap.org/img/w/10d.png"));
    assert!(summary.contains("http://openweathermap.org/img/w/13n.png"));
    assert!(summary.contains("75&nbsp;%"));
    assert!(summary.contains("100&nbsp;%"));
    assert_eq!(
        reading.current_condition_html.as_deref(),
        Some("<img src=\"http://openweathermap.org/img/w/10d.png\">")
    );
}

#[tokio::test]
async fn forecast_failure_fails_the_whole_update() {
    let server = MockServer::start().await;
    mount_current(&server).await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let source = source_for(EndpointId::Data).unwrap();
    let err = source.update(&mut client, &test_config()).await.unwrap_err();

    assert_eq!(err.status(), Status::ServerError);
    assert_eq!(err.message(), "got http-code 503 (server error)");
    assert_eq!(client.stats().total(), 2);
    assert_eq!(client.stats().failed(), 1);
}

#[tokio::test]
async fn zero_forecast_count_skips_the_request() {
    let server = MockServer::start().await;
    mount_current(&server).await;

    let mut cfg = test_config();
    cfg.data.hourly_forecast_count = 0;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let reading = current::poll_data(&mut client, &cfg).await.unwrap();

    assert!(reading.forecast.is_empty());
    assert_eq!(client.stats().total(), 1);
}

#[tokio::test]
async fn malformed_body_is_invalid_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let err = current::poll_current(&mut client, &test_config())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Status::InvalidData);
    assert_eq!(err.message(), "malformed response");
    let record = client.stats().last().cloned().unwrap();
    assert_eq!(record.status, Some(Status::InvalidData));
    assert!(record.url.contains("appid=***"));
}

#[tokio::test]
async fn missing_location_never_reaches_the_network() {
    let server = MockServer::start().await;

    let mut cfg = test_config();
    cfg.location = None;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let err = current::poll_current(&mut client, &cfg).await.unwrap_err();

    assert_eq!(err.status(), Status::InvalidConfig);
    assert!(client.stats().is_empty());
}

#[tokio::test]
async fn onecall_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/3.0/onecall"))
        .and(query_param("exclude", "minutely"))
        .and(query_param("units", "metric"))
        .respond_with(fixture(ONECALL))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.onecall.api_version = OneCallVersion::V3_0;
    cfg.onecall.hourly_forecast_count = 12;
    cfg.onecall.daily_forecast_count = 1;
    cfg.onecall.with_forecast_html = true;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let source = source_for(EndpointId::OneCall).unwrap();
    let report = source.update(&mut client, &cfg).await.unwrap();

    let PollReport::OneCall(reading) = report else {
        panic!("expected a one-call report");
    };

    let now = &reading.current;
    assert_eq!(now.derived.dewpoint, Some(9.2));
    assert_eq!(now.derived.windchill, Some(11.1));
    assert_eq!(now.observation.wind_speed, 16.0);
    assert_eq!(now.derived.compass_text.as_deref(), Some("NNW (348°)"));
    assert_eq!(now.wind_gust, 9.3);
    assert_eq!(now.uv_index, Some(1.7));
    assert_eq!(now.rain_1h, 0.3);

    assert!(reading.minutely.is_empty());
    assert_eq!(reading.hourly.len(), 2);
    assert_eq!(
        reading.hourly[0].absolute_pressure,
        Some(meteo::absolute_pressure(1014.0, 11.0, 100.0))
    );
    assert_eq!(reading.daily.len(), 1);
    assert_eq!(reading.daily[0].temperature.max, 12.8);

    let html = reading.forecast_html.clone().unwrap_or_default();
    assert_eq!(html.matches("<tr>").count(), 2);
    assert!(html.contains("few clouds (20%)"));
}

#[tokio::test]
async fn station_lifecycle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/data/3.0/stations"))
        .and(body_json(json!({
            "external_id": "garden_1",
            "name": "Garden",
            "latitude": 51.5,
            "longitude": 7.25,
            "altitude": 100.0
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ID": "5ed21a12cca8ce0001e4d0a6",
            "external_id": "garden_1",
            "name": "Garden",
            "latitude": 51.5,
            "longitude": 7.25,
            "altitude": 100,
            "source_type": 5
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/data/3.0/measurements"))
        .and(body_json(json!([{
            "station_id": "5ed21a12cca8ce0001e4d0a6",
            "dt": 1_700_000_000,
            "temperature": 12.5,
            "humidity": 80.0
        }])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/3.0/measurements"))
        .and(query_param("station_id", "5ed21a12cca8ce0001e4d0a6"))
        .and(query_param("type", "h"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "h", "date": 1_700_000_000, "temp": {"average": 12.5}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/data/3.0/stations/5ed21a12cca8ce0001e4d0a6"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.station.external_id = "garden_1".into();
    cfg.station.name = "Garden".into();

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();

    let registered = station::register_station(&mut client, &cfg).await.unwrap();
    assert_eq!(registered.id, "5ed21a12cca8ce0001e4d0a6");
    cfg.station.station_id = Some(registered.id.clone());

    let again = station::register_station(&mut client, &cfg).await.unwrap_err();
    assert_eq!(again.status(), Status::InvalidConfig);

    let measurement = Measurement {
        dt: Some(1_700_000_000),
        temperature: Some(12.5),
        humidity: Some(80.0),
        ..Measurement::default()
    };
    station::transmit_measurements(&mut client, &cfg, &measurement)
        .await
        .unwrap();

    let query = MeasurementQuery {
        aggregation: station::Aggregation::Hour,
        ..MeasurementQuery::default()
    };
    let data = station::fetch_measurements(&mut client, &cfg, &query)
        .await
        .unwrap();
    assert_eq!(data[0]["temp"]["average"], json!(12.5));

    station::delete_station(&mut client, &cfg, &registered.id)
        .await
        .unwrap();

    assert_eq!(client.stats().failed(), 0);
}

#[tokio::test]
async fn station_rejects_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/3.0/stations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401})))
        .mount(&server)
        .await;

    let mut client = ApiClient::with_base_url("test-key", &server.uri()).unwrap();
    let err = station::list_stations(&mut client, &test_config())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Status::HttpError);
    assert_eq!(err.message(), "got http-code 401");
}
