//! HTTP request handlers.

use super::{ApiError, AppState};
use crate::db::{normalize_address, HistoryEntry, DEFAULT_WINDOW_HOURS, MAX_WINDOW_HOURS};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

type ApiResult = Result<Response, ApiError>;

// ============================================================================
// Probing
// ============================================================================

/// GET /api/health-check
pub async fn handle_health_check(State(state): State<AppState>) -> ApiResult {
    let batch = state.runner.run_once().await?;
    Ok(Json(batch).into_response())
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub hours: Option<String>,
}

impl WindowQuery {
    /// Requested window, falling back to 24 hours on missing or bad input
    /// and capped at [`MAX_WINDOW_HOURS`].
    fn hours(&self) -> u32 {
        self.hours
            .as_deref()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .filter(|h| *h > 0)
            .map(|h| h.min(MAX_WINDOW_HOURS))
            .unwrap_or(DEFAULT_WINDOW_HOURS)
    }
}

/// Window from a query string that may not deserialize at all
/// (e.g. a repeated `hours` key).
fn window_hours(query: Result<Query<WindowQuery>, QueryRejection>) -> u32 {
    match query {
        Ok(Query(query)) => query.hours(),
        Err(rejection) => {
            tracing::debug!("Ignoring query string: {}", rejection.body_text());
            DEFAULT_WINDOW_HOURS
        }
    }
}

/// GET /api/host-history/{*host}
pub async fn handle_host_history(
    State(state): State<AppState>,
    host: Result<Path<String>, PathRejection>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult {
    let Path(host) = host?;
    let host = normalize_address(&host).map_err(|e| ApiError::Validation(e.to_string()))?;
    let hours = window_hours(query);

    let history: Vec<HistoryEntry> = state
        .history
        .query(&host, hours)?
        .iter()
        .map(HistoryEntry::from)
        .collect();

    Ok(Json(json!({
        "host": host,
        "history": history,
        "period_hours": hours,
    }))
    .into_response())
}

/// GET /api/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult {
    let hours = window_hours(query);
    let stats = state.history.aggregate(hours)?;

    Ok(Json(json!({
        "total_checks": stats.total_checks,
        "uptime_percentage": stats.uptime_percentage(),
        "average_response_time": stats.average_response_time,
        "period": format!("{} hours", hours),
    }))
    .into_response())
}

// ============================================================================
// Registry
// ============================================================================

/// GET /api/hosts
pub async fn handle_list_hosts(State(state): State<AppState>) -> ApiResult {
    let hosts = state.registry.list_all()?;
    Ok(Json(json!({
        "total": hosts.len(),
        "hosts": hosts,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct AddHostRequest {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// POST /api/add-host
pub async fn handle_add_host(
    State(state): State<AppState>,
    payload: Result<Json<AddHostRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    if req.host.trim().is_empty() {
        return Err(ApiError::Validation("Host is required".to_string()));
    }

    let host = state.registry.add(&req.host, req.display_name.as_deref())?;
    tracing::info!("Added host {} ({})", host.address, host.display_name);

    Ok(Json(json!({
        "success": true,
        "message": "Host added successfully",
        "host": host.address,
        "display_name": host.display_name,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RemoveHostRequest {
    #[serde(default)]
    pub host: String,
}

/// POST /api/remove-host
pub async fn handle_remove_host(
    State(state): State<AppState>,
    payload: Result<Json<RemoveHostRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    if req.host.trim().is_empty() {
        return Err(ApiError::Validation("Host is required".to_string()));
    }

    match state.registry.remove(&req.host)? {
        Some(host) => {
            tracing::info!("Removed host {}", host.address);
            Ok(Json(json!({
                "success": true,
                "message": "Host removed successfully",
                "host": host,
            }))
            .into_response())
        }
        None => Err(ApiError::NotFound("Host not found".to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    #[serde(default)]
    pub host: String,
    pub active: bool,
}

/// POST /api/set-host-active
pub async fn handle_set_host_active(
    State(state): State<AppState>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    if req.host.trim().is_empty() {
        return Err(ApiError::Validation("Host is required".to_string()));
    }

    let host = state.registry.set_active(&req.host, req.active)?;
    tracing::info!("Host {} active={}", host.address, host.is_active);

    Ok(Json(json!({ "success": true, "host": host })).into_response())
}

// ============================================================================
// Fallbacks
// ============================================================================

fn is_api_path(uri: &Uri) -> bool {
    let path = uri.path();
    path == "/api" || path.starts_with("/api/")
}

pub async fn handle_not_found(uri: Uri) -> Response {
    if is_api_path(&uri) {
        ApiError::NotFound("Not found".to_string()).into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not Found").into_response()
    }
}

pub async fn handle_method_not_allowed(uri: Uri) -> Response {
    if is_api_path(&uri) {
        ApiError::MethodNotAllowed.into_response()
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
    }
}
