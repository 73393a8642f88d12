//! Management API Handlers

use super::types::*;
use crate::bridge::{BridgeHandle, MailboxCore};
use crate::connection::{Connection, ConnectionLedger, SortKey, ViewFilter};
use crate::presentation::{ConnectionRow, RenderRequest, TrafficFrame, TrafficView, ViewPreferences};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<ConnectionLedger>,
    pub view: Arc<TrafficView>,
    pub bridge: BridgeHandle,
    /// Present when the network core runs out of process
    pub mailbox: Option<Arc<MailboxCore>>,
    pub prometheus_enabled: bool,
    pub start_time: SystemTime,
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail<T>(status: StatusCode, message: impl Into<String>) -> Reply<T> {
    (status, Json(ApiResponse::error(message.into())))
}

/// Malformed query strings and bodies still answer with the envelope
fn malformed<T>(what: &str, detail: String) -> Reply<T> {
    debug!("Rejected malformed {}: {}", what, detail);
    fail(StatusCode::BAD_REQUEST, format!("Invalid {}: {}", what, detail))
}

/// Health check handler
pub async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: SystemTime::now(),
    }))
}

/// Ledger status, including the empty-state flag
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<LedgerStatus>> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let snapshot = state.ledger.snapshot();
    let status = LedgerStatus {
        empty: snapshot.is_empty(),
        active_connections: snapshot.len(),
        generation: snapshot.generation,
        tracking: state.bridge.is_tracking(),
        pending_close_requests: state.mailbox.as_ref().map(|m| m.pending()),
        uptime_seconds: uptime,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(ApiResponse::success(status))
}

/// Sorted, filtered, paged connection list
pub async fn get_connections(
    State(state): State<AppState>,
    query: Result<Query<ConnectionsQuery>, QueryRejection>,
) -> Reply<TrafficFrame> {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return malformed("query", rejection.body_text()),
    };
    let sort_key = match query.sort.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<SortKey>() {
            Ok(key) => Some(key),
            Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => None,
    };

    let filter = match ViewFilter::parse(
        query.network.as_deref(),
        query.rule.as_deref(),
        query.host.as_deref(),
        query.source_net.as_deref(),
    ) {
        Ok(filter) => filter,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("{:#}", e)),
    };

    let request = RenderRequest {
        sort_key,
        descending: query.descending,
        filter,
        page: query.page,
        limit: query.limit,
    };

    ok(state.view.render(&state.ledger, request))
}

/// One connection with its display slot
pub async fn get_connection(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Reply<ConnectionRow> {
    match state.view.detail(&state.ledger, &uuid) {
        Some(row) => ok(row),
        None => fail(StatusCode::NOT_FOUND, "Connection not found"),
    }
}

/// Pretty JSON document of one connection
pub async fn export_connection(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<String, StatusCode> {
    match state.view.detail_json(&state.ledger, &uuid) {
        Ok(Some(json)) => Ok(json),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to serialize connection {}: {}", uuid, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Ask the core to close a connection. The entry disappears once a later
/// snapshot omits it.
pub async fn close_connection(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Reply<CloseResult> {
    let forwarded = state.ledger.request_close(&uuid);
    if forwarded {
        info!("Close requested via management API: {}", uuid);
    }
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(CloseResult { uuid, forwarded })),
    )
}

pub async fn get_preferences(State(state): State<AppState>) -> Json<ApiResponse<ViewPreferences>> {
    Json(ApiResponse::success(state.view.preferences()))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    body: Result<Json<ViewPreferences>, JsonRejection>,
) -> Reply<ViewPreferences> {
    let Json(preferences) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed("preferences", rejection.body_text()),
    };
    state.view.set_preferences(preferences);
    ok(preferences)
}

/// Turn connection tracking on or off
pub async fn update_tracking(
    State(state): State<AppState>,
    body: Result<Json<TrackingState>, JsonRejection>,
) -> Reply<TrackingState> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed("tracking state", rejection.body_text()),
    };
    state.bridge.set_tracking(request.enabled);
    ok(request)
}

/// Prometheus text exposition
pub async fn export_metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    if !state.prometheus_enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(state.ledger.metrics().export_prometheus())
}

/// Full snapshot pushed by an out-of-process core
pub async fn core_push_snapshot(
    State(state): State<AppState>,
    body: Result<Json<Vec<Connection>>, JsonRejection>,
) -> Reply<SnapshotAccepted> {
    let Json(connections) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed("snapshot", rejection.body_text()),
    };
    let count = connections.len();
    match state.bridge.snapshot_sender().try_push(connections) {
        Ok(()) => {
            debug!(count, "Snapshot queued from core");
            (
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(SnapshotAccepted {
                    connections: count,
                    tracking: state.bridge.is_tracking(),
                })),
            )
        }
        Err(e) => {
            warn!("Rejected snapshot from core: {}", e);
            fail(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Hand pending close requests to the core
pub async fn core_drain_close_requests(State(state): State<AppState>) -> Reply<Vec<String>> {
    match &state.mailbox {
        Some(mailbox) => ok(mailbox.drain()),
        None => fail(StatusCode::NOT_FOUND, "Network core is not attached through the mailbox"),
    }
}

/// Whether the core should be pushing snapshots
pub async fn core_tracking(State(state): State<AppState>) -> Json<ApiResponse<TrackingState>> {
    let enabled = match &state.mailbox {
        Some(mailbox) => mailbox.is_tracking(),
        None => state.bridge.is_tracking(),
    };
    Json(ApiResponse::success(TrackingState { enabled }))
}
