//! Core Bridge
//!
//! One background task connects the ledger to the network core: snapshots are
//! applied in the order the core produced them, and close requests flow the
//! other way without the caller ever waiting on the core.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument};

use super::types::{NetworkCore, SnapshotSender, TaggedSnapshot, TrackingEpoch};
use crate::config::FeedConfig;
use crate::connection::{CloseRequest, CloseRequests, ConnectionLedger};

/// Drives snapshot application and close forwarding
pub struct CoreBridge {
    ledger: Arc<ConnectionLedger>,
    core: Arc<dyn NetworkCore>,
    snapshots: mpsc::Receiver<TaggedSnapshot>,
    close_requests: CloseRequests,
    tracking: watch::Receiver<TrackingEpoch>,
}

/// Control handle for a running bridge
#[derive(Clone)]
pub struct BridgeHandle {
    snapshots: SnapshotSender,
    tracking: Arc<watch::Sender<TrackingEpoch>>,
}

impl CoreBridge {
    /// Create a bridge and its handle
    pub fn new(
        ledger: Arc<ConnectionLedger>,
        core: Arc<dyn NetworkCore>,
        close_requests: CloseRequests,
        config: &FeedConfig,
    ) -> (Self, BridgeHandle) {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(config.snapshot_queue);
        let (tracking_tx, tracking_rx) = watch::channel(TrackingEpoch {
            enabled: config.tracking_on_start,
            epoch: 0,
        });

        let bridge = Self {
            ledger,
            core,
            snapshots: snapshot_rx,
            close_requests,
            tracking: tracking_rx.clone(),
        };

        let handle = BridgeHandle {
            snapshots: SnapshotSender::new(snapshot_tx, tracking_rx),
            tracking: Arc::new(tracking_tx),
        };

        (bridge, handle)
    }

    /// Run until shutdown is signalled or every snapshot producer is gone
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut state = *self.tracking.borrow_and_update();
        self.core.set_tracking(state.enabled);
        info!(tracking = state.enabled, "Core bridge started");

        loop {
            tokio::select! {
                maybe_snapshot = self.snapshots.recv() => {
                    match maybe_snapshot {
                        Some(snapshot) => {
                            // A toggle may be pending behind this snapshot
                            self.sync_tracking(&mut state);
                            if state.enabled && snapshot.epoch == state.epoch {
                                self.ledger.replace_snapshot(snapshot.connections);
                            } else {
                                debug!(
                                    count = snapshot.connections.len(),
                                    pushed_epoch = snapshot.epoch,
                                    epoch = state.epoch,
                                    "Discarding snapshot pushed outside the current tracking window"
                                );
                            }
                        }
                        None => {
                            info!("Snapshot feed closed, stopping core bridge");
                            break;
                        }
                    }
                }
                Some(request) = self.close_requests.recv() => {
                    self.forward_close(request);
                }
                Ok(()) = self.tracking.changed() => {
                    self.sync_tracking(&mut state);
                }
                _ = shutdown_rx.recv() => {
                    info!("Core bridge received shutdown signal");
                    break;
                }
            }
        }

        info!("Core bridge stopped");
    }

    /// Catch up with the tracking switch. Every epoch change from enabled
    /// passes through disabled, so the ledger is cleared even when an
    /// off/on pair is observed at once.
    fn sync_tracking(&mut self, state: &mut TrackingEpoch) {
        let next = *self.tracking.borrow_and_update();
        if next.epoch == state.epoch {
            return;
        }
        if state.enabled {
            self.apply_tracking(false);
        }
        if next.enabled {
            self.apply_tracking(true);
        }
        *state = next;
    }

    #[instrument(skip(self, request), fields(uuid = %request.uuid))]
    fn forward_close(&self, request: CloseRequest) {
        match self.core.close_connection(&request.uuid) {
            Ok(()) => debug!(generation = request.generation, "Network core accepted close request"),
            Err(e) => {
                // The next snapshot is the source of truth either way
                debug!(error = %e, "Network core could not close connection");
                self.ledger.metrics().record_close_failure();
            }
        }
    }

    fn apply_tracking(&self, enabled: bool) {
        self.core.set_tracking(enabled);
        if enabled {
            info!("Connection tracking enabled");
        } else {
            self.ledger.clear();
            info!("Connection tracking disabled, ledger cleared");
        }
    }
}

impl BridgeHandle {
    pub fn snapshot_sender(&self) -> SnapshotSender {
        self.snapshots.clone()
    }

    /// Turn snapshot intake on or off. Snapshots pushed before the change
    /// are discarded.
    pub fn set_tracking(&self, enabled: bool) {
        self.tracking.send_if_modified(|state| {
            if state.enabled == enabled {
                return false;
            }
            state.enabled = enabled;
            state.epoch += 1;
            true
        });
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.borrow().enabled
    }
}
