//! Management API Module
//!
//! REST surface over the ledger: the sorted connection view, close requests,
//! view preferences and the mailbox endpoints an out-of-process core talks to.

pub mod api;
pub mod auth;
pub mod handlers;
pub mod server;
pub mod types;

pub use api::ManagementApi;
pub use auth::ApiAuth;
pub use handlers::AppState;
pub use server::ManagementServer;
pub use types::*;
