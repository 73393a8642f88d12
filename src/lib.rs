//! connledger
//!
//! Ledger of live network connections fed by periodic snapshots from a
//! network core, with a sorted read view and asynchronous close requests.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod management;
pub mod metrics;
pub mod presentation;
pub mod shutdown;

pub use bridge::{BridgeHandle, CoreBridge, MailboxCore, NetworkCore};
pub use config::Config;
pub use connection::{Connection, ConnectionLedger, SortKey};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the ledger service
pub type Result<T> = anyhow::Result<T>;
