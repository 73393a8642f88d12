//! Network Core Seam

use crate::connection::Connection;
use crate::Result;
use anyhow::anyhow;
use tokio::sync::{mpsc, watch};

/// The component that owns the actual flows.
///
/// Calls arrive on the bridge task and must return promptly; an
/// implementation that needs I/O should queue the work and return.
pub trait NetworkCore: Send + Sync + 'static {
    /// Ask the core to tear down a flow. Failure is expected when the flow
    /// is already gone and is not reported back to the presentation layer.
    fn close_connection(&self, uuid: &str) -> Result<()>;

    /// Start or stop producing snapshots
    fn set_tracking(&self, _enabled: bool) {}
}

/// Tracking switch state. `epoch` advances on every on/off change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrackingEpoch {
    pub enabled: bool,
    pub epoch: u64,
}

/// A snapshot stamped with the tracking epoch it was pushed under
#[derive(Debug)]
pub(crate) struct TaggedSnapshot {
    pub epoch: u64,
    pub connections: Vec<Connection>,
}

/// Producer handle the core pushes full snapshots through
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    tx: mpsc::Sender<TaggedSnapshot>,
    tracking: watch::Receiver<TrackingEpoch>,
}

impl SnapshotSender {
    pub(crate) fn new(tx: mpsc::Sender<TaggedSnapshot>, tracking: watch::Receiver<TrackingEpoch>) -> Self {
        Self { tx, tracking }
    }

    fn tag(&self, connections: Vec<Connection>) -> TaggedSnapshot {
        TaggedSnapshot {
            epoch: self.tracking.borrow().epoch,
            connections,
        }
    }

    /// Push a snapshot, waiting for queue space
    pub async fn push(&self, connections: Vec<Connection>) -> Result<()> {
        self.tx
            .send(self.tag(connections))
            .await
            .map_err(|_| anyhow!("Snapshot feed is closed"))
    }

    /// Push a snapshot without waiting. Fails when the queue is full.
    pub fn try_push(&self, connections: Vec<Connection>) -> Result<()> {
        self.tx.try_send(self.tag(connections)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("Snapshot queue is full"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("Snapshot feed is closed"),
        })
    }
}
