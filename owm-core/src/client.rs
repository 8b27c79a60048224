//! HTTP transport for the OpenWeatherMap API.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::http::{HttpOutcome, ResponsePolicy, TransportError, classify};
use crate::stats::CallStats;

pub const API_BASE_URL: &str = "https://api.openweathermap.org";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends requests one at a time and records every attempt in its [`CallStats`].
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    appid: String,
    stats: CallStats,
    last_body: Option<String>,
}

impl ApiClient {
    pub fn new(appid: impl Into<String>) -> Result<Self> {
        Self::with_base_url(appid, API_BASE_URL)
    }

    /// Point the client at another host, e.g. a proxy or a mock server.
    pub fn with_base_url(appid: impl Into<String>, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            appid: appid.into(),
            stats: CallStats::default(),
            last_body: None,
        })
    }

    pub fn with_history_size(mut self, size: usize) -> Self {
        self.stats = CallStats::with_capacity(size);
        self
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CallStats {
        &mut self.stats
    }

    /// Body of the most recent response, as received. `None` if it was empty.
    pub fn last_raw_body(&self) -> Option<&str> {
        self.last_body.as_deref()
    }

    pub async fn get(&mut self, cmd: &str, args: &[(&str, String)]) -> HttpOutcome {
        self.send(Method::GET, cmd, args, None, ResponsePolicy::FETCH)
            .await
    }

    pub async fn send(
        &mut self,
        method: Method,
        cmd: &str,
        args: &[(&str, String)],
        body: Option<&Value>,
        policy: ResponsePolicy,
    ) -> HttpOutcome {
        let started = Instant::now();

        let (outcome, logged_url) = match self.url_for(cmd, args) {
            Ok(url) => {
                let logged = redact(&url);
                tracing::debug!(method = method.as_str(), url = %logged, "sending request");
                (self.execute(method, url, body, policy).await, logged)
            }
            Err(err) => {
                let transport = TransportError::new("url", err.to_string());
                let logged = format!("{}/{}", self.base_url, cmd.trim_start_matches('/'));
                (classify(Some(&transport), 0, b"", policy), logged)
            }
        };

        let duration = started.elapsed();
        match outcome.status() {
            Some(status) => tracing::warn!(
                url = %logged_url,
                status = status.code(),
                error = %outcome.message,
                "request failed"
            ),
            None => tracing::debug!(url = %logged_url, ?duration, "request succeeded"),
        }

        self.stats.record(&logged_url, &outcome, duration);
        self.last_body = outcome.raw_body.clone();
        outcome
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        policy: ResponsePolicy,
    ) -> HttpOutcome {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return classify(Some(&TransportError::from_reqwest(&err)), 0, b"", policy),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => classify(None, status, &bytes, policy),
            Err(err) => classify(Some(&TransportError::from_reqwest(&err)), status, b"", policy),
        }
    }

    fn url_for(&self, cmd: &str, args: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}/{}", self.base_url, cmd.trim_start_matches('/'));
        let params = std::iter::once(("appid", self.appid.as_str()))
            .chain(args.iter().map(|(k, v)| (*k, v.as_str())));

        Url::parse_with_params(&base, params).with_context(|| format!("Invalid request url {base}"))
    }
}

/// The url as it goes into logs and the call history: API key masked.
fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::http::OutcomeKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_sends_key_and_arguments() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("appid", "secret"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dt": 1})))
            .mount(&mock_server)
            .await;

        let mut client = ApiClient::with_base_url("secret", &mock_server.uri()).unwrap();
        let outcome = client
            .get("data/2.5/weather", &[("units", "metric".to_string())])
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.data, Some(json!({"dt": 1})));

        let record = client.stats().last().cloned().unwrap();
        assert!(record.url.contains("appid=***"));
        assert!(!record.url.contains("secret"));
        assert!(record.error.is_empty());
        assert_eq!(record.status, None);
    }

    #[tokio::test]
    async fn server_errors_are_recorded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut client = ApiClient::with_base_url("k", &mock_server.uri()).unwrap();
        let outcome = client.get("data/2.5/weather", &[]).await;

        assert_eq!(outcome.kind, OutcomeKind::ServerError);
        assert_eq!(client.stats().failed(), 1);
        assert_eq!(
            client.stats().last().and_then(|r| r.status),
            Some(Status::ServerError)
        );
    }

    #[tokio::test]
    async fn send_posts_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/data/3.0/stations"))
            .and(body_json(json!({"name": "garden"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ID": "abc"})))
            .mount(&mock_server)
            .await;

        let mut client = ApiClient::with_base_url("k", &mock_server.uri()).unwrap();
        let body = json!({"name": "garden"});
        let outcome = client
            .send(
                Method::POST,
                "data/3.0/stations",
                &[],
                Some(&body),
                ResponsePolicy::TRANSMIT,
            )
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.http_status, Some(201));
    }

    #[tokio::test]
    async fn keeps_the_body_of_the_last_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"dt":1}"#))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/data/3.0/stations/abc"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let mut client = ApiClient::with_base_url("k", &mock_server.uri()).unwrap();
        assert_eq!(client.last_raw_body(), None);

        client.get("data/2.5/weather", &[]).await;
        assert_eq!(client.last_raw_body(), Some(r#"{"dt":1}"#));

        client
            .send(
                Method::DELETE,
                "data/3.0/stations/abc",
                &[],
                None,
                ResponsePolicy::TRANSMIT,
            )
            .await;
        assert_eq!(client.last_raw_body(), None);
    }

    #[tokio::test]
    async fn bad_base_url_is_a_transport_error() {
        let mut client = ApiClient::with_base_url("k", "not a url").unwrap();
        let outcome = client.get("data/2.5/weather", &[]).await;

        assert_eq!(outcome.kind, OutcomeKind::ServerError);
        assert!(outcome.message.starts_with("got transport error url"));
        assert_eq!(client.stats().len(), 1);
    }
}
