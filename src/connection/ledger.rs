//! Connection Ledger Implementation
//!
//! Holds the latest snapshot reported by the network core. Writers publish a
//! fresh immutable [`Snapshot`] by swapping an `Arc` inside a watch channel;
//! readers clone the `Arc` and sort their own copy, so neither side holds the
//! lock for longer than a pointer copy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::types::{Connection, Snapshot, SortKey};
use super::view::{apply_query, sort_connections, ViewQuery};
use crate::metrics::LedgerMetrics;

/// A request for the network core to tear down one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub uuid: String,
    /// Snapshot generation the request was made against
    pub generation: u64,
}

/// Receiving half of the ledger's close-request channel
pub type CloseRequests = mpsc::UnboundedReceiver<CloseRequest>;

/// Authoritative mirror of the connections the core reports as open
pub struct ConnectionLedger {
    current: watch::Sender<Arc<Snapshot>>,
    close_tx: mpsc::UnboundedSender<CloseRequest>,
    metrics: Arc<LedgerMetrics>,
}

impl ConnectionLedger {
    /// Create an empty ledger and the channel its close requests go out on
    pub fn new(metrics: Arc<LedgerMetrics>) -> (Self, CloseRequests) {
        let (current, _) = watch::channel(Arc::new(Snapshot::default()));
        let (close_tx, close_rx) = mpsc::unbounded_channel();

        let ledger = Self {
            current,
            close_tx,
            metrics,
        };

        (ledger, close_rx)
    }

    /// Atomically replace the live set. Returns the new generation.
    ///
    /// A record in the new snapshot wholly supersedes the previous record with
    /// the same uuid; connections missing from it are considered closed.
    pub fn replace_snapshot(&self, mut connections: Vec<Connection>) -> u64 {
        let mut seen = HashSet::with_capacity(connections.len());
        let before_dedup = connections.len();
        connections.retain(|c| seen.insert(c.uuid.clone()));
        if connections.len() != before_dedup {
            warn!(
                duplicates = before_dedup - connections.len(),
                "Snapshot contained duplicate connection ids, keeping first occurrence"
            );
        }

        let previous = self.snapshot();
        let delta = compare_with_previous(&previous, &connections);
        if delta.regressions > 0 {
            self.metrics.record_counter_regressions(delta.regressions);
        }

        let count = connections.len();
        let mut generation = 0;
        self.current.send_modify(|slot| {
            generation = slot.generation + 1;
            *slot = Arc::new(Snapshot {
                generation,
                connections,
            });
        });

        self.metrics.record_snapshot(count, generation);
        debug!(
            generation,
            active = count,
            opened = delta.opened,
            closed = delta.closed,
            "Applied connection snapshot"
        );

        generation
    }

    /// Drop every entry, as if the core reported no active connections
    pub fn clear(&self) -> u64 {
        self.replace_snapshot(Vec::new())
    }

    /// Current snapshot, shared and immutable
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.borrow().clone()
    }

    /// Fresh copy of the current snapshot ordered by `sort_key`
    pub fn view(&self, sort_key: SortKey, descending: bool) -> Vec<Connection> {
        let snapshot = self.snapshot();
        let mut connections = snapshot.connections.clone();
        sort_connections(&mut connections, sort_key, descending);
        connections
    }

    /// Like [`view`](Self::view) but only connections matching the query filter
    pub fn view_filtered(&self, query: &ViewQuery) -> Vec<Connection> {
        apply_query(&self.snapshot(), query)
    }

    /// Ask the core to close a connection.
    ///
    /// The entry stays in the ledger until a later snapshot omits it. Returns
    /// `false` without doing anything when the uuid is not currently present.
    pub fn request_close(&self, uuid: &str) -> bool {
        let snapshot = self.snapshot();
        if !snapshot.contains(uuid) {
            debug!(uuid, generation = snapshot.generation, "Ignoring close request for unknown connection");
            self.metrics.record_close_ignored();
            return false;
        }

        let request = CloseRequest {
            uuid: uuid.to_string(),
            generation: snapshot.generation,
        };

        if self.close_tx.send(request).is_err() {
            warn!(uuid, "Close request dropped, network core bridge is not running");
        } else {
            debug!(uuid, "Forwarded close request to network core");
        }
        self.metrics.record_close_forwarded();
        true
    }

    pub fn is_empty(&self) -> bool {
        self.current.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.borrow().len()
    }

    pub fn generation(&self) -> u64 {
        self.current.borrow().generation
    }

    pub fn get(&self, uuid: &str) -> Option<Connection> {
        self.current.borrow().get(uuid).cloned()
    }

    /// Observe every snapshot published after this call
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.current.subscribe()
    }

    pub fn metrics(&self) -> &Arc<LedgerMetrics> {
        &self.metrics
    }
}

#[derive(Debug, Default)]
struct SnapshotDelta {
    opened: usize,
    closed: usize,
    regressions: u64,
}

fn compare_with_previous(previous: &Snapshot, next: &[Connection]) -> SnapshotDelta {
    let prior: HashMap<&str, &Connection> = previous
        .connections
        .iter()
        .map(|c| (c.uuid.as_str(), c))
        .collect();

    let mut delta = SnapshotDelta::default();
    let mut carried = 0;

    for conn in next {
        match prior.get(conn.uuid.as_str()) {
            Some(old) => {
                carried += 1;
                if conn.upload_total < old.upload_total || conn.download_total < old.download_total {
                    warn!(
                        uuid = %conn.uuid,
                        upload_before = old.upload_total,
                        upload_after = conn.upload_total,
                        download_before = old.download_total,
                        download_after = conn.download_total,
                        "Network core reported decreasing byte counters"
                    );
                    delta.regressions += 1;
                }
            }
            None => delta.opened += 1,
        }
    }

    delta.closed = prior.len() - carried;
    delta
}
