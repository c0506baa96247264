//! Host registry contract and address normalization.
//!
//! Every path that keys on a host address (registration, probing, history
//! lookups) goes through [`normalize_address`] so the keys line up.

use thiserror::Error;
use url::Url;

use super::models::Host;
use super::store::DbError;

/// Hosts seeded into an empty registry on first use.
pub const DEFAULT_HOSTS: &[&str] = &[
    "https://google.com",
    "https://github.com",
    "https://stackoverflow.com",
    "https://python.org",
    "https://flask.palletsprojects.com",
];

/// Host input validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Host is required")]
    Empty,
    #[error("invalid host address: {0}")]
    Malformed(String),
}

/// The set of monitored hosts.
///
/// Implementations serialize mutations and allow snapshots to be taken
/// concurrently from request handlers and the background scheduler.
pub trait HostRegistry: Send + Sync {
    /// Snapshot of active hosts. Seeds [`DEFAULT_HOSTS`] the first time the
    /// registry is found empty.
    fn list_active(&self) -> Result<Vec<Host>, DbError>;

    /// Every registered host, active or not.
    fn list_all(&self) -> Result<Vec<Host>, DbError>;

    /// Register a host. Fails with [`DbError::Duplicate`] when the normalized
    /// address is already present (compared case-insensitively).
    fn add(&self, address: &str, display_name: Option<&str>) -> Result<Host, DbError>;

    /// Remove a host, returning the removed record if it existed.
    fn remove(&self, address: &str) -> Result<Option<Host>, DbError>;

    fn exists(&self, address: &str) -> Result<bool, DbError>;

    /// Flip the active flag, the only field that changes in place.
    fn set_active(&self, address: &str, active: bool) -> Result<Host, DbError>;
}

/// Normalize a user-supplied host address.
///
/// Trims whitespace, defaults a missing scheme to `https://`, and lower-cases
/// the scheme and authority. The path, if any, is kept as given.
/// `normalize_address(normalize_address(x)) == normalize_address(x)`.
pub fn normalize_address(raw: &str) -> Result<String, AddressError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    let (scheme, rest) = if lower.starts_with("https://") {
        ("https://", &trimmed["https://".len()..])
    } else if lower.starts_with("http://") {
        ("http://", &trimmed["http://".len()..])
    } else {
        ("https://", trimmed)
    };

    let (authority, path) = split_authority(rest);
    if authority.is_empty() {
        return Err(AddressError::Malformed(trimmed.to_string()));
    }

    let normalized = format!("{}{}{}", scheme, authority.to_ascii_lowercase(), path);

    let parsed = Url::parse(&normalized)
        .map_err(|e| AddressError::Malformed(format!("{}: {}", trimmed, e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AddressError::Malformed(trimmed.to_string()));
    }

    Ok(normalized)
}

/// Display name used when none is given: the address's authority
/// (`host[:port]`).
pub fn default_display_name(address: &str) -> String {
    let rest = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    split_authority(rest).0.to_string()
}

fn split_authority(rest: &str) -> (&str, &str) {
    match rest.find(['/', '?', '#']) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    }
}
