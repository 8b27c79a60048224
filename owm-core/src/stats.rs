//! Rolling history of API calls, kept for the operator only.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Status;
use crate::http::HttpOutcome;

pub const DEFAULT_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Request url with the API key masked.
    pub url: String,
    /// Empty when the call succeeded.
    pub error: String,
    pub status: Option<Status>,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitUnit {
    Minute,
    Day,
    Month,
}

impl LimitUnit {
    pub fn span(self) -> chrono::Duration {
        match self {
            LimitUnit::Minute => chrono::Duration::minutes(1),
            LimitUnit::Day => chrono::Duration::days(1),
            LimitUnit::Month => chrono::Duration::days(30),
        }
    }
}

/// Free-tier call quota of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLimit {
    pub value: u64,
    pub unit: LimitUnit,
}

impl std::fmt::Display for ApiLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.unit {
            LimitUnit::Minute => "minute",
            LimitUnit::Day => "day",
            LimitUnit::Month => "month",
        };
        write!(f, "{} calls/{unit}", self.value)
    }
}

#[derive(Debug, Clone)]
pub struct CallStats {
    capacity: usize,
    records: VecDeque<CallRecord>,
    total: u64,
    failed: u64,
    limits: Vec<ApiLimit>,
}

impl Default for CallStats {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }
}

impl CallStats {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
            total: 0,
            failed: 0,
            limits: Vec::new(),
        }
    }

    pub fn record(&mut self, url: &str, outcome: &HttpOutcome, duration: Duration) {
        self.push(CallRecord {
            url: url.to_string(),
            error: outcome.message.clone(),
            status: outcome.status(),
            timestamp: Utc::now(),
            duration,
        });
    }

    pub(crate) fn push(&mut self, record: CallRecord) {
        self.total += 1;
        if record.status.is_some() {
            self.failed += 1;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Oldest first.
    pub fn records(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&CallRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Calls since creation, including the ones already evicted.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn set_limits(&mut self, limits: &[ApiLimit]) {
        self.limits = limits.to_vec();
    }

    pub fn limits(&self) -> &[ApiLimit] {
        &self.limits
    }

    /// Retained calls within the window of `limit`, counted back from `now`.
    pub fn usage(&self, limit: &ApiLimit, now: DateTime<Utc>) -> usize {
        let since = now - limit.unit.span();
        self.records.iter().filter(|r| r.timestamp > since).count()
    }
}
