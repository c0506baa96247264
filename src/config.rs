//! Configuration module for hostwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::db::MAX_WINDOW_HOURS;
use crate::probe::DEFAULT_PROBE_TIMEOUT;
use crate::scheduler::{DEFAULT_CHECK_INTERVAL, DEFAULT_RETRY_INTERVAL};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 5000)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "data/health_data.db")
    pub db_path: String,
    /// Run the background scheduler (default: true)
    pub continuous: bool,
    /// Delay between successful monitoring cycles (default: 5 minutes)
    pub check_interval: Duration,
    /// Delay after a failed monitoring cycle (default: 1 minute)
    pub retry_interval: Duration,
    /// Wait bound for a single probe (default: 10 seconds)
    pub probe_timeout: Duration,
    /// How long probe history is kept (default: 720 hours)
    pub retention_hours: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            db_path: "data/health_data.db".to_string(),
            continuous: true,
            check_interval: DEFAULT_CHECK_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            retention_hours: 720,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HOSTWATCH_HTTP_PORT`: HTTP port (default: 5000)
    /// - `HOSTWATCH_DB_PATH`: Database file path (default: "data/health_data.db")
    /// - `HOSTWATCH_CONTINUOUS`: Background monitoring on/off (default: true)
    /// - `HOSTWATCH_CHECK_INTERVAL_SECS`: Monitoring cadence (default: 300)
    /// - `HOSTWATCH_RETRY_INTERVAL_SECS`: Backoff after a failed cycle (default: 60)
    /// - `HOSTWATCH_PROBE_TIMEOUT_SECS`: Per-probe wait bound (default: 10)
    /// - `HOSTWATCH_RETENTION_HOURS`: History retention (default: 720)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "HOSTWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("HOSTWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(raw) = lookup("HOSTWATCH_CONTINUOUS") {
            match parse_bool(&raw) {
                Some(continuous) => cfg.continuous = continuous,
                None => tracing::warn!("Ignoring invalid HOSTWATCH_CONTINUOUS={:?}", raw),
            }
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "HOSTWATCH_CHECK_INTERVAL_SECS").filter(|s| *s > 0) {
            cfg.check_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "HOSTWATCH_RETRY_INTERVAL_SECS").filter(|s| *s > 0) {
            cfg.retry_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "HOSTWATCH_PROBE_TIMEOUT_SECS").filter(|s| *s > 0) {
            cfg.probe_timeout = Duration::from_secs(secs);
        }

        if let Some(hours) = parse_var::<u32>(&lookup, "HOSTWATCH_RETENTION_HOURS").filter(|h| *h > 0) {
            if hours > MAX_WINDOW_HOURS {
                tracing::warn!("HOSTWATCH_RETENTION_HOURS={} capped to {}", hours, MAX_WINDOW_HOURS);
            }
            cfg.retention_hours = hours.min(MAX_WINDOW_HOURS);
        }

        cfg
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
