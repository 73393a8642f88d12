//! Network Core Bridge Module
//!
//! Connects the ledger to the component that owns the actual flows.

pub mod feed;
pub mod mailbox;
pub mod types;

pub use feed::{BridgeHandle, CoreBridge};
pub use mailbox::MailboxCore;
pub use types::{NetworkCore, SnapshotSender};
