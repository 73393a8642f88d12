//! Presentation Module
//!
//! Display-side state kept apart from the ledger: user ordering preferences
//! and stable list slots.

pub mod stable_index;
pub mod traffic;

pub use stable_index::StableIndex;
pub use traffic::{ConnectionRow, RenderRequest, TrafficFrame, TrafficView, ViewPreferences};
