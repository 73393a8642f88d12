//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use crate::connection::SortKey;
use crate::management::types::ApiAuthConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub view: ViewConfig,
    pub monitoring: MonitoringConfig,
    pub management_api: ManagementApiConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Snapshot feed and close-request queue sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Snapshots buffered between the core and the ledger
    pub snapshot_queue: usize,
    /// Pending close requests held for an out-of-process core
    pub close_queue: usize,
    pub tracking_on_start: bool,
}

/// Default ordering and paging of connection views
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    pub sort_key: SortKey,
    pub descending: bool,
    pub default_limit: usize,
    pub max_limit: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub prometheus_enabled: bool,
}

/// Management API configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementApiConfig {
    pub auth: ApiAuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9190)),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            snapshot_queue: 16,
            close_queue: 256,
            tracking_on_start: true,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sort_key: SortKey::Start,
            descending: false,
            default_limit: 50,
            max_limit: 1000,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            prometheus_enabled: true,
        }
    }
}
