//! Core library for the `owm` CLI.
//!
//! This crate defines:
//! - Configuration and the per-field selection
//! - The HTTP transport, outcome classification and call history
//! - Meteorological derivations (dewpoint, windchill, Beaufort, ...)
//! - Adapters for the current weather, one-call and station endpoints
//! - HTML summaries of a reading
//!
//! It is used by `owm-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod meteo;
pub mod model;
pub mod provider;
pub mod stats;
pub mod summary;

pub use client::ApiClient;
pub use config::{Config, Coordinates, FieldSelection};
pub use error::{PollError, Status, StatusClass};
pub use http::{HttpOutcome, ResponsePolicy};
pub use model::{DataReading, OneCallReading, PollReport};
pub use provider::{EndpointId, WeatherSource};
pub use stats::{CallRecord, CallStats};
