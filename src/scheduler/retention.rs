//! Retention manager for cleaning up old history.

use crate::db::{window_start, HistoryStore};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often old history is pruned.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Deletes history older than the retention window.
pub struct RetentionManager {
    history: Arc<dyn HistoryStore>,
    retention_hours: u32,
    interval: Duration,
    stop: watch::Sender<bool>,
}

impl RetentionManager {
    pub fn new(history: Arc<dyn HistoryStore>, retention_hours: u32) -> Self {
        Self::with_interval(history, retention_hours, PRUNE_INTERVAL)
    }

    pub fn with_interval(history: Arc<dyn HistoryStore>, retention_hours: u32, interval: Duration) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            history,
            retention_hours,
            interval,
            stop,
        }
    }

    /// Start the retention background task. Prunes once immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let history = self.history.clone();
        let retention_hours = self.retention_hours;
        let mut rx = self.stop.subscribe();
        let mut interval = tokio::time::interval(self.interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = interval.tick() => {
                        process_retention(history.as_ref(), retention_hours);
                    }
                }
            }
        })
    }

    /// Stop the retention manager.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }
}

fn process_retention(history: &dyn HistoryStore, retention_hours: u32) {
    let cutoff = window_start(retention_hours);

    match history.prune_before(cutoff) {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(
            "RetentionManager: Pruned {} health checks older than {}h",
            deleted,
            retention_hours
        ),
        Err(e) => tracing::error!("RetentionManager: Failed to prune history: {}", e),
    }
}
