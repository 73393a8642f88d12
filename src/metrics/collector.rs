//! Metrics Collector

use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use tracing::error;

/// Prometheus metrics for the connection ledger and its core bridge
pub struct LedgerMetrics {
    prometheus_registry: Registry,

    active_connections: IntGauge,
    snapshot_generation: IntGauge,
    snapshots_total: IntCounter,
    close_forwarded_total: IntCounter,
    close_ignored_total: IntCounter,
    close_failures_total: IntCounter,
    counter_regressions_total: IntCounter,
}

impl LedgerMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Self {
        let prometheus_registry = Registry::new();

        let active_connections = IntGauge::new(
            "connledger_active_connections",
            "Connections in the most recently applied snapshot"
        ).expect("Failed to create active_connections gauge");

        let snapshot_generation = IntGauge::new(
            "connledger_snapshot_generation",
            "Generation of the most recently applied snapshot"
        ).expect("Failed to create snapshot_generation gauge");

        let snapshots_total = IntCounter::new(
            "connledger_snapshots_total",
            "Snapshots applied to the ledger"
        ).expect("Failed to create snapshots_total counter");

        let close_forwarded_total = IntCounter::new(
            "connledger_close_requests_forwarded_total",
            "Close requests forwarded to the network core"
        ).expect("Failed to create close_forwarded_total counter");

        let close_ignored_total = IntCounter::new(
            "connledger_close_requests_ignored_total",
            "Close requests for connections absent from the current snapshot"
        ).expect("Failed to create close_ignored_total counter");

        let close_failures_total = IntCounter::new(
            "connledger_close_failures_total",
            "Close requests the network core failed to act on"
        ).expect("Failed to create close_failures_total counter");

        let counter_regressions_total = IntCounter::new(
            "connledger_counter_regressions_total",
            "Byte counters reported lower than in the previous snapshot"
        ).expect("Failed to create counter_regressions_total counter");

        prometheus_registry.register(Box::new(active_connections.clone()))
            .expect("Failed to register active_connections");
        prometheus_registry.register(Box::new(snapshot_generation.clone()))
            .expect("Failed to register snapshot_generation");
        prometheus_registry.register(Box::new(snapshots_total.clone()))
            .expect("Failed to register snapshots_total");
        prometheus_registry.register(Box::new(close_forwarded_total.clone()))
            .expect("Failed to register close_forwarded_total");
        prometheus_registry.register(Box::new(close_ignored_total.clone()))
            .expect("Failed to register close_ignored_total");
        prometheus_registry.register(Box::new(close_failures_total.clone()))
            .expect("Failed to register close_failures_total");
        prometheus_registry.register(Box::new(counter_regressions_total.clone()))
            .expect("Failed to register counter_regressions_total");

        Self {
            prometheus_registry,
            active_connections,
            snapshot_generation,
            snapshots_total,
            close_forwarded_total,
            close_ignored_total,
            close_failures_total,
            counter_regressions_total,
        }
    }

    /// Record an applied snapshot
    pub fn record_snapshot(&self, connections: usize, generation: u64) {
        self.snapshots_total.inc();
        self.active_connections.set(connections as i64);
        self.snapshot_generation.set(generation as i64);
    }

    pub fn record_close_forwarded(&self) {
        self.close_forwarded_total.inc();
    }

    pub fn record_close_ignored(&self) {
        self.close_ignored_total.inc();
    }

    pub fn record_close_failure(&self) {
        self.close_failures_total.inc();
    }

    pub fn record_counter_regressions(&self, count: u64) {
        self.counter_regressions_total.inc_by(count);
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_total.get()
    }

    pub fn close_requests_forwarded(&self) -> u64 {
        self.close_forwarded_total.get()
    }

    pub fn close_requests_ignored(&self) -> u64 {
        self.close_ignored_total.get()
    }

    pub fn close_failures(&self) -> u64 {
        self.close_failures_total.get()
    }

    pub fn counter_regressions(&self) -> u64 {
        self.counter_regressions_total.get()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.prometheus_registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to encode Prometheus metrics");
                String::new()
            }
        }
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
