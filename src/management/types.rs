//! Management API Types

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: SystemTime,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: SystemTime::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub timestamp: SystemTime,
}

/// Ledger and bridge status
#[derive(Debug, Serialize)]
pub struct LedgerStatus {
    pub empty: bool,
    pub active_connections: usize,
    pub generation: u64,
    pub tracking: bool,
    pub pending_close_requests: Option<usize>,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Query string of the connection list
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionsQuery {
    pub sort: Option<String>,
    pub descending: Option<bool>,
    pub network: Option<String>,
    pub rule: Option<String>,
    pub host: Option<String>,
    pub source_net: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Outcome of a close request
#[derive(Debug, Serialize)]
pub struct CloseResult {
    pub uuid: String,
    /// False when the connection was not in the current snapshot
    pub forwarded: bool,
}

/// Tracking toggle request and state
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TrackingState {
    pub enabled: bool,
}

/// Acknowledgement of a snapshot pushed by the core
#[derive(Debug, Serialize)]
pub struct SnapshotAccepted {
    pub connections: usize,
    pub tracking: bool,
}

/// API authentication configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiAuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub basic_auth: Option<BasicAuthConfig>,
}

/// Basic authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}
