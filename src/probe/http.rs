//! HTTP probe implementation.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use super::{build_outcome, ProbeError};
use crate::db::{normalize_address, ProbeOutcome};

/// Issues bounded HTTP GET probes. Cheap to share; holds one pooled client.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    /// Create a prober whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("hostwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(error_chain(&e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one host. Never fails: every error is captured in the outcome.
    pub async fn probe(&self, address: &str) -> ProbeOutcome {
        let url = match normalize_address(address) {
            Ok(url) => url,
            Err(e) => {
                return build_outcome(
                    address.trim().to_string(),
                    Err(ProbeError::Transport(e.to_string())),
                )
            }
        };

        let result = self.fetch(&url).await;
        match &result {
            Ok((code, elapsed)) => tracing::debug!(%url, code, elapsed_ms = elapsed, "probe completed"),
            Err(e) => tracing::debug!(%url, error = %e, "probe failed"),
        }
        build_outcome(url, result)
    }

    /// Returns the status code and elapsed milliseconds. Only the status line
    /// and headers are awaited; the body is dropped unread.
    async fn fetch(&self, url: &str) -> Result<(u16, f64), ProbeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok((response.status().as_u16(), elapsed_ms))
    }

    fn map_error(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else if err.is_connect() {
            ProbeError::Connect(error_chain(&err))
        } else {
            ProbeError::Transport(error_chain(&err))
        }
    }
}

/// Render an error with its sources, e.g.
/// `error sending request: client error (Connect): tcp connect error`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
