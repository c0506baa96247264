//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A host under monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Normalized address, e.g. `https://example.com`.
    #[serde(rename = "host")]
    pub address: String,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Health classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Online,
    Slow,
    VerySlow,
    Error,
    Timeout,
    Offline,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Online => "online",
            HealthState::Slow => "slow",
            HealthState::VerySlow => "very_slow",
            HealthState::Error => "error",
            HealthState::Timeout => "timeout",
            HealthState::Offline => "offline",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(HealthState::Online),
            "slow" => Ok(HealthState::Slow),
            "very_slow" => Ok(HealthState::VerySlow),
            "error" => Ok(HealthState::Error),
            "timeout" => Ok(HealthState::Timeout),
            "offline" => Ok(HealthState::Offline),
            other => Err(format!("unknown health state: {}", other)),
        }
    }
}

/// The result of one probe attempt. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub host: String,
    pub status: HealthState,
    /// Milliseconds, rounded to two decimals.
    pub response_time: Option<f64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A row of host history as served by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub status: HealthState,
    pub response_time: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ProbeOutcome> for HistoryEntry {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            status: outcome.status,
            response_time: outcome.response_time,
            timestamp: outcome.timestamp,
        }
    }
}

/// Aggregate statistics over a trailing window. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateStats {
    pub total_checks: i64,
    pub online_count: i64,
    /// Mean over rows that carry a response time; 0 when there are none.
    pub average_response_time: f64,
}

impl AggregateStats {
    /// `100 * online / total`, or 0 for an empty window.
    pub fn uptime_percentage(&self) -> f64 {
        if self.total_checks == 0 {
            return 0.0;
        }
        round2(self.online_count as f64 * 100.0 / self.total_checks as f64)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_state_round_trips_through_str() {
        for state in [
            HealthState::Online,
            HealthState::Slow,
            HealthState::VerySlow,
            HealthState::Error,
            HealthState::Timeout,
            HealthState::Offline,
        ] {
            assert_eq!(state.as_str().parse::<HealthState>().unwrap(), state);
        }
        assert!("degraded".parse::<HealthState>().is_err());
    }

    #[test]
    fn test_health_state_serializes_snake_case() {
        let json = serde_json::to_string(&HealthState::VerySlow).unwrap();
        assert_eq!(json, "\"very_slow\"");
    }

    #[test]
    fn test_uptime_percentage_empty_window() {
        let stats = AggregateStats::default();
        assert_eq!(stats.uptime_percentage(), 0.0);
    }

    #[test]
    fn test_uptime_percentage_rounds() {
        let stats = AggregateStats {
            total_checks: 3,
            online_count: 2,
            average_response_time: 120.0,
        };
        assert_eq!(stats.uptime_percentage(), 66.67);
    }

    #[test]
    fn test_host_serializes_address_as_host() {
        let host = Host {
            address: "https://example.com".to_string(),
            display_name: "example.com".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value["host"], "https://example.com");
        assert_eq!(value["is_active"], true);
    }
}
