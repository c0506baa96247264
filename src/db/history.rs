//! History store contract: an append-only log of probe outcomes.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::models::{AggregateStats, ProbeOutcome};
use super::store::DbError;

/// Maximum number of rows returned by a history query.
pub const HISTORY_LIMIT: usize = 100;

/// Default trailing window for history and stats queries.
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Largest trailing window accepted from callers (100 years).
pub const MAX_WINDOW_HOURS: u32 = 24 * 365 * 100;

/// Start of a trailing window of `hours`. Windows reaching past the
/// representable range start at the Unix epoch.
pub fn window_start(hours: u32) -> DateTime<Utc> {
    ChronoDuration::try_hours(i64::from(hours))
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub trait HistoryStore: Send + Sync {
    /// Append one outcome. Appends for a single host are kept in order.
    fn append(&self, outcome: &ProbeOutcome) -> Result<(), DbError>;

    /// Outcomes for `host` from the last `since_hours`, newest first,
    /// capped at [`HISTORY_LIMIT`].
    fn query(&self, host: &str, since_hours: u32) -> Result<Vec<ProbeOutcome>, DbError>;

    /// Aggregate statistics over the last `since_hours` across all hosts.
    fn aggregate(&self, since_hours: u32) -> Result<AggregateStats, DbError>;

    /// Delete outcomes older than `cutoff`, returning how many were removed.
    fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError>;
}
