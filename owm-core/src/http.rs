//! Classification of one HTTP attempt into the status taxonomy.

use serde_json::Value;

use crate::error::{PollError, Status};

/// Which status codes count as success and whether an empty body is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub min_success: u16,
    pub max_success: u16,
    pub allow_empty_body: bool,
}

impl ResponsePolicy {
    /// Data fetchers: exactly `200` and a body is required.
    pub const FETCH: Self = Self {
        min_success: 200,
        max_success: 200,
        allow_empty_body: false,
    };

    /// Station transmissions: any `2xx`, e.g. `204 No Content`.
    pub const TRANSMIT: Self = Self {
        min_success: 200,
        max_success: 299,
        allow_empty_body: true,
    };

    pub fn is_success(&self, http_status: u16) -> bool {
        (self.min_success..=self.max_success).contains(&http_status)
    }
}

/// A request that never produced an HTTP status (connect failure, timeout, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub code: String,
    pub message: String,
}

impl TransportError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_redirect() {
            "redirect"
        } else if err.is_body() {
            "body"
        } else if err.is_decode() {
            "decode"
        } else if err.is_request() {
            "request"
        } else {
            "other"
        };
        Self::new(code, err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Ok,
    ServerError,
    HttpError,
    InvalidData,
}

/// Result of one request attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOutcome {
    pub kind: OutcomeKind,
    /// Empty on success.
    pub message: String,
    pub http_status: Option<u16>,
    pub raw_body: Option<String>,
    /// Decoded body; `None` for failures and for accepted empty bodies.
    pub data: Option<Value>,
}

impl HttpOutcome {
    fn failure(kind: OutcomeKind, message: String, http_status: Option<u16>, body: &[u8]) -> Self {
        Self {
            kind,
            message,
            http_status,
            raw_body: raw_body(body),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == OutcomeKind::Ok
    }

    /// Host status after this attempt; `None` leaves the current status alone.
    pub fn status(&self) -> Option<Status> {
        match self.kind {
            OutcomeKind::Ok => None,
            OutcomeKind::ServerError => Some(Status::ServerError),
            OutcomeKind::HttpError => Some(Status::HttpError),
            OutcomeKind::InvalidData => Some(Status::InvalidData),
        }
    }

    pub fn into_result(self) -> Result<Option<Value>, PollError> {
        match self.kind {
            OutcomeKind::Ok => Ok(self.data),
            OutcomeKind::ServerError => Err(PollError::ServerError(self.message)),
            OutcomeKind::HttpError => Err(PollError::HttpError(self.message)),
            OutcomeKind::InvalidData => Err(PollError::InvalidData(self.message)),
        }
    }

    /// Like [`into_result`](Self::into_result) but a missing body is invalid data.
    pub fn into_data(self) -> Result<Value, PollError> {
        self.into_result()?
            .ok_or_else(|| PollError::InvalidData("no data".to_string()))
    }
}

fn raw_body(body: &[u8]) -> Option<String> {
    (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned())
}

/// `null`, `false` and `""` decode fine but carry nothing usable.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Decide the outcome of one attempt. Checks run in order: transport, status, body, JSON.
pub fn classify(
    transport_error: Option<&TransportError>,
    http_status: u16,
    body: &[u8],
    policy: ResponsePolicy,
) -> HttpOutcome {
    if let Some(err) = transport_error {
        return HttpOutcome::failure(
            OutcomeKind::ServerError,
            format!("got transport error {} ({})", err.code, err.message),
            None,
            body,
        );
    }

    if !policy.is_success(http_status) {
        let (kind, message) = if (500..=599).contains(&http_status) {
            (
                OutcomeKind::ServerError,
                format!("got http-code {http_status} (server error)"),
            )
        } else {
            (OutcomeKind::HttpError, format!("got http-code {http_status}"))
        };
        return HttpOutcome::failure(kind, message, Some(http_status), body);
    }

    if body.is_empty() {
        if policy.allow_empty_body {
            return HttpOutcome {
                kind: OutcomeKind::Ok,
                message: String::new(),
                http_status: Some(http_status),
                raw_body: None,
                data: None,
            };
        }
        return HttpOutcome::failure(
            OutcomeKind::InvalidData,
            "no data".to_string(),
            Some(http_status),
            body,
        );
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) if !is_falsy(&value) => HttpOutcome {
            kind: OutcomeKind::Ok,
            message: String::new(),
            http_status: Some(http_status),
            raw_body: raw_body(body),
            data: Some(value),
        },
        _ => HttpOutcome::failure(
            OutcomeKind::InvalidData,
            "malformed response".to_string(),
            Some(http_status),
            body,
        ),
    }
}
