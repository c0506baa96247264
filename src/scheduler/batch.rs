//! Batch runner: probe every active host once and record the outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::db::{DbError, HistoryStore, Host, HostRegistry, ProbeOutcome};
use crate::probe::{build_outcome, ProbeError, Prober};

/// One host's entry in a batch result.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub display_name: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Result of one full pass over the registry.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Entries in snapshot order.
    pub results: Vec<BatchEntry>,
    pub timestamp: DateTime<Utc>,
    pub total_hosts: usize,
}

/// Runs batches of probes. Shared by the on-demand endpoint and the
/// background scheduler.
pub struct BatchRunner {
    registry: Arc<dyn HostRegistry>,
    history: Arc<dyn HistoryStore>,
    prober: Prober,
}

impl BatchRunner {
    pub fn new(registry: Arc<dyn HostRegistry>, history: Arc<dyn HistoryStore>, prober: Prober) -> Self {
        Self {
            registry,
            history,
            prober,
        }
    }

    /// Snapshot the registry and run a batch over it. Fails only when the
    /// snapshot itself cannot be taken.
    pub async fn run_once(&self) -> Result<BatchResult, DbError> {
        let hosts = self.registry.list_active()?;
        Ok(self.run_batch(hosts).await)
    }

    /// Probe every active host concurrently, append each outcome to history
    /// and wait for all of them before returning.
    pub async fn run_batch(&self, hosts: Vec<Host>) -> BatchResult {
        let hosts: Vec<Host> = hosts.into_iter().filter(|h| h.is_active).collect();

        let mut tasks = JoinSet::new();
        for (index, host) in hosts.iter().enumerate() {
            let prober = self.prober.clone();
            let history = self.history.clone();
            let address = host.address.clone();

            tasks.spawn(async move {
                let outcome = prober.probe(&address).await;
                record(history.as_ref(), &outcome);
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; hosts.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }

        let results: Vec<BatchEntry> = hosts
            .into_iter()
            .zip(outcomes)
            .map(|(host, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    let failed = build_outcome(
                        host.address.clone(),
                        Err(ProbeError::Transport("probe task failed".to_string())),
                    );
                    record(self.history.as_ref(), &failed);
                    failed
                });
                BatchEntry {
                    display_name: host.display_name,
                    outcome,
                }
            })
            .collect();

        BatchResult {
            total_hosts: results.len(),
            results,
            timestamp: Utc::now(),
        }
    }
}

fn record(history: &dyn HistoryStore, outcome: &ProbeOutcome) {
    if let Err(e) = history.append(outcome) {
        tracing::error!("Failed to record outcome for {}: {}", outcome.host, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{HealthState, Store};
    use crate::probe::testing::{closed_port_url, spawn_test_server};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn host(address: &str, display_name: &str) -> Host {
        Host {
            address: address.to_string(),
            display_name: display_name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn runner(store: &Arc<Store>, timeout: Duration) -> BatchRunner {
        BatchRunner::new(store.clone(), store.clone(), Prober::new(timeout).unwrap())
    }

    struct UnavailableRegistry;

    impl HostRegistry for UnavailableRegistry {
        fn list_active(&self) -> Result<Vec<Host>, DbError> {
            Err(DbError::Io(std::io::Error::other("registry unavailable")))
        }
        fn list_all(&self) -> Result<Vec<Host>, DbError> {
            self.list_active()
        }
        fn add(&self, _: &str, _: Option<&str>) -> Result<Host, DbError> {
            Err(DbError::NotFound)
        }
        fn remove(&self, _: &str) -> Result<Option<Host>, DbError> {
            Ok(None)
        }
        fn exists(&self, _: &str) -> Result<bool, DbError> {
            Ok(false)
        }
        fn set_active(&self, _: &str, _: bool) -> Result<Host, DbError> {
            Err(DbError::NotFound)
        }
    }

    #[tokio::test]
    async fn test_batch_absorbs_failures() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let runner = runner(&store, Duration::from_millis(300));
        let base = spawn_test_server().await;
        let closed = closed_port_url();

        let hosts = vec![
            host(&base, "up"),
            host(&format!("{}/hang", base), "stuck"),
            host(&format!("{}/missing", base), "broken"),
            host(&closed, "gone"),
        ];

        let batch = runner.run_batch(hosts).await;
        assert_eq!(batch.total_hosts, 4);
        assert_eq!(batch.results.len(), 4);

        let names: Vec<_> = batch.results.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, ["up", "stuck", "broken", "gone"]);

        assert_eq!(batch.results[0].outcome.status_code, Some(200));
        assert_eq!(batch.results[1].outcome.status, HealthState::Timeout);
        assert_eq!(batch.results[1].outcome.status_code, None);
        assert_eq!(batch.results[2].outcome.status, HealthState::Error);
        assert_eq!(batch.results[2].outcome.status_code, Some(404));
        assert_eq!(batch.results[3].outcome.status, HealthState::Offline);
    }

    #[tokio::test]
    async fn test_batch_appends_every_outcome() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let runner = runner(&store, Duration::from_millis(300));
        let base = spawn_test_server().await;
        let hang = format!("{}/hang", base);

        runner.run_batch(vec![host(&base, "up"), host(&hang, "stuck")]).await;

        assert_eq!(store.query(&base, 1).unwrap().len(), 1);
        let stuck = store.query(&hang, 1).unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].status, HealthState::Timeout);
        assert_eq!(store.aggregate(1).unwrap().total_checks, 2);
    }

    #[tokio::test]
    async fn test_batch_skips_inactive_hosts() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let runner = runner(&store, Duration::from_millis(300));
        let base = spawn_test_server().await;

        let mut paused = host(&closed_port_url(), "paused");
        paused.is_active = false;

        let batch = runner.run_batch(vec![host(&base, "up"), paused]).await;
        assert_eq!(batch.total_hosts, 1);
        assert_eq!(batch.results[0].display_name, "up");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let batch = runner(&store, Duration::from_secs(1)).run_batch(Vec::new()).await;
        assert_eq!(batch.total_hosts, 0);
        assert!(batch.results.is_empty());
    }

    #[tokio::test]
    async fn test_run_once_uses_registry_snapshot() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let base = spawn_test_server().await;
        store.add(&base, Some("local")).unwrap();

        let batch = assert_ok!(runner(&store, Duration::from_secs(5)).run_once().await);
        assert_eq!(batch.total_hosts, 1);
        assert_eq!(batch.results[0].display_name, "local");
        assert_eq!(batch.results[0].outcome.host, base);
    }

    #[tokio::test]
    async fn test_run_once_fails_when_registry_unavailable() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let runner = BatchRunner::new(
            Arc::new(UnavailableRegistry),
            store.clone(),
            Prober::new(Duration::from_secs(1)).unwrap(),
        );

        assert_err!(runner.run_once().await);
        assert_eq!(store.aggregate(24).unwrap().total_checks, 0);
    }

    #[tokio::test]
    async fn test_batch_result_json_shape() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let closed = closed_port_url();
        let batch = runner(&store, Duration::from_secs(1))
            .run_batch(vec![host(&closed, "gone")])
            .await;

        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["total_hosts"], 1);
        let entry = &value["results"][0];
        assert_eq!(entry["host"], closed.as_str());
        assert_eq!(entry["display_name"], "gone");
        assert_eq!(entry["status"], "offline");
        assert!(entry["response_time"].is_null());
        assert!(entry["status_code"].is_null());
        assert!(entry["error_message"].is_string());
    }
}
