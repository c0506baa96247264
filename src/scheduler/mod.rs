//! Scheduler module for continuous monitoring.
//!
//! The scheduler re-runs a batch on a fixed cadence, falling back to a
//! shorter retry interval after a failed cycle. The retention manager prunes
//! old history alongside it.

mod batch;
mod retention;

pub use batch::*;
pub use retention::*;

use crate::db::HealthState;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cadence between successful cycles.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Delay before retrying after a failed cycle.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Runs [`BatchRunner::run_once`] forever until stopped.
pub struct Scheduler {
    runner: Arc<BatchRunner>,
    interval: Duration,
    retry_interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(runner: Arc<BatchRunner>, interval: Duration, retry_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runner,
            interval,
            retry_interval,
            shutdown,
        }
    }

    /// Spawn the monitoring loop. The first cycle runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let runner = self.runner.clone();
        let interval = self.interval;
        let retry_interval = self.retry_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        tracing::info!(
            "Starting scheduler (interval {:?}, retry {:?})",
            interval,
            retry_interval
        );

        tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }

                let delay = if run_cycle(runner.clone()).await {
                    interval
                } else {
                    retry_interval
                };

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            tracing::info!("Scheduler stopped");
        })
    }

    /// Ask the loop to exit. A cycle already in flight runs to completion.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Run one cycle on its own task so a panic counts as a failed cycle
/// instead of killing the loop. Returns whether the cycle succeeded.
async fn run_cycle(runner: Arc<BatchRunner>) -> bool {
    match tokio::spawn(async move { runner.run_once().await }).await {
        Ok(Ok(batch)) => {
            let online = batch
                .results
                .iter()
                .filter(|e| e.outcome.status == HealthState::Online)
                .count();
            tracing::info!(
                "Health check cycle complete: {}/{} hosts online",
                online,
                batch.total_hosts
            );
            true
        }
        Ok(Err(e)) => {
            tracing::error!("Health check cycle failed: {}", e);
            false
        }
        Err(e) => {
            tracing::error!("Health check cycle aborted: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, HistoryStore, Host, HostRegistry, Store};
    use crate::probe::Prober;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry whose first `failures` snapshots fail, then returns no hosts.
    struct FlakyRegistry {
        calls: AtomicUsize,
        failures: usize,
    }

    impl FlakyRegistry {
        fn new(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HostRegistry for FlakyRegistry {
        fn list_active(&self) -> Result<Vec<Host>, DbError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(DbError::Io(std::io::Error::other("registry unavailable")))
            } else {
                Ok(Vec::new())
            }
        }
        fn list_all(&self) -> Result<Vec<Host>, DbError> {
            Ok(Vec::new())
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

    fn runner(registry: Arc<FlakyRegistry>) -> Arc<BatchRunner> {
        let history: Arc<dyn HistoryStore> = Arc::new(Store::open_in_memory().unwrap());
        Arc::new(BatchRunner::new(
            registry,
            history,
            Prober::new(Duration::from_secs(1)).unwrap(),
        ))
    }

    async fn stop_and_join(scheduler: &Scheduler, handle: JoinHandle<()>) {
        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_runs_first_cycle_immediately_then_waits() {
        let registry = Arc::new(FlakyRegistry::new(0));
        let scheduler = Scheduler::new(
            runner(registry.clone()),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        );

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(registry.calls(), 1);

        stop_and_join(&scheduler, handle).await;
    }

    #[tokio::test]
    async fn test_failed_cycle_retries_on_short_interval() {
        let registry = Arc::new(FlakyRegistry::new(2));
        let scheduler = Scheduler::new(
            runner(registry.clone()),
            Duration::from_secs(3600),
            Duration::from_millis(20),
        );

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Two failures, then one success that parks on the long interval.
        assert_eq!(registry.calls(), 3);
        assert!(!handle.is_finished());

        stop_and_join(&scheduler, handle).await;
    }

    #[tokio::test]
    async fn test_stop_before_start_exits() {
        let registry = Arc::new(FlakyRegistry::new(0));
        let scheduler = Scheduler::new(
            runner(registry.clone()),
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        scheduler.stop();
        let handle = scheduler.start();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert_eq!(registry.calls(), 0);
    }
}
