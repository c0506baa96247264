//! Probe module for host health checks.
//!
//! A probe is a single bounded HTTP GET. Whatever happens on the wire is
//! folded into a [`ProbeOutcome`]; nothing propagates to the caller.

mod http;

#[cfg(test)]
pub(crate) mod testing;

pub use http::*;

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;

use crate::db::{round2, HealthState, ProbeOutcome};

/// Latency below which a 200 response counts as `online`.
pub const ONLINE_THRESHOLD_MS: f64 = 500.0;

/// Latency at or above which a 200 response counts as `very_slow`.
pub const SLOW_THRESHOLD_MS: f64 = 2000.0;

/// Default wait bound for one probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Ways a probe can fail to produce a response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("Request timeout (>{0:?})")]
    Timeout(Duration),
    /// DNS, TCP or TLS failure while establishing the connection.
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Transport(String),
}

/// Classify a received response.
pub fn classify(status_code: u16, elapsed_ms: f64) -> HealthState {
    if status_code != 200 {
        return HealthState::Error;
    }
    if elapsed_ms < ONLINE_THRESHOLD_MS {
        HealthState::Online
    } else if elapsed_ms < SLOW_THRESHOLD_MS {
        HealthState::Slow
    } else {
        HealthState::VerySlow
    }
}

/// Classify a probe that never got a response.
pub fn classify_failure(err: &ProbeError) -> HealthState {
    match err {
        ProbeError::Timeout(_) => HealthState::Timeout,
        ProbeError::Connect(_) => HealthState::Offline,
        ProbeError::Transport(_) => HealthState::Error,
    }
}

/// Build the outcome for `host` from a probe result of
/// `(status code, elapsed milliseconds)`.
pub fn build_outcome(host: String, result: Result<(u16, f64), ProbeError>) -> ProbeOutcome {
    let timestamp = Utc::now();
    match result {
        Ok((status_code, elapsed_ms)) => {
            // Classified on the recorded (rounded) latency so the stored
            // response time and state always agree.
            let response_time = round2(elapsed_ms);
            ProbeOutcome {
                host,
                status: classify(status_code, response_time),
                response_time: Some(response_time),
                status_code: Some(status_code),
                error_message: None,
                timestamp,
            }
        }
        Err(err) => ProbeOutcome {
            host,
            status: classify_failure(&err),
            response_time: None,
            status_code: None,
            error_message: Some(err.to_string()),
            timestamp,
        },
    }
}
