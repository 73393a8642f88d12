//! Metrics Module
//!
//! Prometheus counters and gauges for the ledger and the core bridge.

pub mod collector;

pub use collector::LedgerMetrics;
