//! Status taxonomy shared by every endpoint adapter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base of the module specific error codes, as defined by the host runtime.
const ERROR_BASE: u32 = 200;

/// Host visible status of a polling instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Inactive,
    InvalidConfig,
    ServerError,
    HttpError,
    InvalidData,
}

/// What the next timer tick should do for a given [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Poll normally.
    Valid,
    /// Last poll failed on the remote side; poll again on the next tick.
    Retryable,
    /// Do not poll until the configuration changes.
    Invalid,
}

impl Status {
    pub const fn code(self) -> u32 {
        match self {
            Status::Active => 102,
            Status::Inactive => 104,
            Status::InvalidConfig => ERROR_BASE + 1,
            Status::ServerError => ERROR_BASE + 2,
            Status::HttpError => ERROR_BASE + 3,
            Status::InvalidData => ERROR_BASE + 4,
        }
    }

    pub fn caption(self) -> &'static str {
        match self {
            Status::Active => "Instance is active",
            Status::Inactive => "Instance is inactive",
            Status::InvalidConfig => "Instance is inactive (invalid configuration)",
            Status::ServerError => "Instance is inactive (server error)",
            Status::HttpError => "Instance is inactive (http error)",
            Status::InvalidData => "Instance is inactive (invalid data)",
        }
    }

    pub fn class(self) -> StatusClass {
        match self {
            Status::Active => StatusClass::Valid,
            Status::ServerError | Status::HttpError | Status::InvalidData => StatusClass::Retryable,
            Status::Inactive | Status::InvalidConfig => StatusClass::Invalid,
        }
    }

    pub fn is_error(self) -> bool {
        self.code() > ERROR_BASE
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.caption(), self.code())
    }
}

/// Why a poll produced no reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl PollError {
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidConfig(_) => Status::InvalidConfig,
            Self::ServerError(_) => Status::ServerError,
            Self::HttpError(_) => Status::HttpError,
            Self::InvalidData(_) => Status::InvalidData,
        }
    }

    /// The bare message, without the category prefix of `Display`.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidConfig(msg)
            | Self::ServerError(msg)
            | Self::HttpError(msg)
            | Self::InvalidData(msg) => msg,
        }
    }
}
