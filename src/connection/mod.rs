//! Connection Ledger Module
//!
//! Mirrors the set of open connections reported by the network core and
//! serves sorted views and close requests to the presentation layer.

pub mod ledger;
pub mod types;
pub mod view;

pub use ledger::{CloseRequest, CloseRequests, ConnectionLedger};
pub use types::{Connection, Snapshot, SortKey};
pub use view::{apply_query, sort_connections, ViewFilter, ViewQuery};
