//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::history::{window_start, HistoryStore, HISTORY_LIMIT};
use super::models::*;
use super::registry::{default_display_name, normalize_address, AddressError, HostRegistry, DEFAULT_HOSTS};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const HOST_COLUMNS: &str = "host, display_name, is_active, created_at";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    InvalidAddress(#[from] AddressError),
    #[error("Host already exists")]
    Duplicate(String),
    #[error("Host not found")]
    NotFound,
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store. Backs both the host registry and the
/// probe history.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path, creating the parent
    /// directory if needed.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Create a store that lives only as long as the process.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

// --- Host registry ---

impl HostRegistry for Store {
    fn list_active(&self) -> Result<Vec<Host>, DbError> {
        let conn = self.conn()?;
        seed_if_empty(&conn)?;
        query_hosts(
            &conn,
            &format!("SELECT {} FROM monitored_hosts WHERE is_active = 1 ORDER BY id", HOST_COLUMNS),
        )
    }

    fn list_all(&self) -> Result<Vec<Host>, DbError> {
        let conn = self.conn()?;
        query_hosts(
            &conn,
            &format!("SELECT {} FROM monitored_hosts ORDER BY id", HOST_COLUMNS),
        )
    }

    fn add(&self, address: &str, display_name: Option<&str>) -> Result<Host, DbError> {
        let address = normalize_address(address)?;
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_display_name(&address));
        let host = Host {
            address,
            display_name,
            is_active: true,
            created_at: Utc::now(),
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO monitored_hosts (host, display_name, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
            params![host.address, host.display_name, format_db_time(host.created_at)],
        );

        match inserted {
            Ok(_) => Ok(host),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Duplicate(host.address))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, address: &str) -> Result<Option<Host>, DbError> {
        let address = normalize_address(address)?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let existing = find_host(&tx, &address)?;
        if existing.is_some() {
            tx.execute("DELETE FROM monitored_hosts WHERE host = ?1", params![address])?;
        }

        tx.commit()?;
        Ok(existing)
    }

    fn exists(&self, address: &str) -> Result<bool, DbError> {
        let address = normalize_address(address)?;
        let conn = self.conn()?;
        Ok(find_host(&conn, &address)?.is_some())
    }

    fn set_active(&self, address: &str, active: bool) -> Result<Host, DbError> {
        let address = normalize_address(address)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE monitored_hosts SET is_active = ?1 WHERE host = ?2",
            params![active, address],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        find_host(&conn, &address)?.ok_or(DbError::NotFound)
    }
}

/// Seed the default host set the first time the registry is read while
/// empty. The `meta.seeded` marker makes this happen at most once.
fn seed_if_empty(conn: &Connection) -> Result<(), DbError> {
    let seeded: Option<String> = conn
        .query_row("SELECT value FROM meta WHERE key = 'seeded'", [], |row| row.get(0))
        .optional()?;
    if seeded.is_some() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    let count: i64 = tx.query_row("SELECT COUNT(*) FROM monitored_hosts", [], |row| row.get(0))?;
    if count == 0 {
        let now = format_db_time(Utc::now());
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO monitored_hosts (host, display_name, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
        )?;
        for host in DEFAULT_HOSTS {
            stmt.execute(params![host, default_display_name(host), now])?;
        }
        drop(stmt);
        tracing::info!("Seeded registry with {} default hosts", DEFAULT_HOSTS.len());
    }
    tx.execute("INSERT OR REPLACE INTO meta (key, value) VALUES ('seeded', '1')", [])?;
    tx.commit()?;
    Ok(())
}

fn query_hosts(conn: &Connection, sql: &str) -> Result<Vec<Host>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let hosts = stmt
        .query_map([], host_from_row)?
        .collect::<SqlResult<Vec<_>>>()?;
    Ok(hosts)
}

fn find_host(conn: &Connection, address: &str) -> Result<Option<Host>, DbError> {
    let host = conn
        .query_row(
            &format!("SELECT {} FROM monitored_hosts WHERE host = ?1", HOST_COLUMNS),
            params![address],
            host_from_row,
        )
        .optional()?;
    Ok(host)
}

fn host_from_row(row: &Row<'_>) -> SqlResult<Host> {
    let created_at: String = row.get(3)?;
    Ok(Host {
        address: row.get(0)?,
        display_name: row.get(1)?,
        is_active: row.get(2)?,
        created_at: parse_db_time(&created_at).unwrap_or_else(Utc::now),
    })
}

// --- Probe history ---

impl HistoryStore for Store {
    fn append(&self, outcome: &ProbeOutcome) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO health_checks (host, status, response_time, status_code, error_message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.host,
                outcome.status,
                outcome.response_time,
                outcome.status_code,
                outcome.error_message,
                format_db_time(outcome.timestamp),
            ],
        )?;
        Ok(())
    }

    fn query(&self, host: &str, since_hours: u32) -> Result<Vec<ProbeOutcome>, DbError> {
        let cutoff = window_start(since_hours);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT host, status, response_time, status_code, error_message, timestamp
             FROM health_checks
             WHERE host = ?1 AND timestamp >= ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;

        let outcomes = stmt
            .query_map(
                params![host, format_db_time(cutoff), HISTORY_LIMIT as i64],
                |row| {
                    let time_str: String = row.get(5)?;
                    Ok(ProbeOutcome {
                        host: row.get(0)?,
                        status: row.get(1)?,
                        response_time: row.get(2)?,
                        status_code: row.get(3)?,
                        error_message: row.get(4)?,
                        timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                    })
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(outcomes)
    }

    fn aggregate(&self, since_hours: u32) -> Result<AggregateStats, DbError> {
        let cutoff = window_start(since_hours);
        let conn = self.conn()?;
        let (total_checks, online_count, average): (i64, i64, Option<f64>) = conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'online' THEN 1 ELSE 0 END), 0),
                AVG(response_time)
             FROM health_checks
             WHERE timestamp >= ?1",
            params![format_db_time(cutoff)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(AggregateStats {
            total_checks,
            online_count,
            average_response_time: round2(average.unwrap_or(0.0)),
        })
    }

    fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM health_checks WHERE timestamp < ?1",
            params![format_db_time(cutoff)],
        )?;
        Ok(deleted)
    }
}

impl ToSql for HealthState {
    fn to_sql(&self) -> SqlResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for HealthState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn format_db_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
