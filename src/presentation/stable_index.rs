//! Stable display slots for volatile connection ids

use std::collections::HashMap;

use crate::connection::Snapshot;

/// Maps each uuid to a small dense integer on first sighting.
///
/// Slots are handed out in insertion order and never reused, even after the
/// connection closes, so list widgets keep a stable element identity across
/// re-renders. Entries for closed connections are pruned; `next` only grows.
/// Belongs to the presentation layer; the ledger never sees it.
#[derive(Debug, Default)]
pub struct StableIndex {
    slots: HashMap<String, u64>,
    next: u64,
    pruned_generation: u64,
}

impl StableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `uuid`, assigning the next one if it has not been seen
    pub fn slot(&mut self, uuid: &str) -> u64 {
        if let Some(&slot) = self.slots.get(uuid) {
            return slot;
        }
        let slot = self.next;
        self.next += 1;
        self.slots.insert(uuid.to_string(), slot);
        slot
    }

    /// Forget every uuid for which `live` is false
    pub fn retain(&mut self, live: impl Fn(&str) -> bool) {
        self.slots.retain(|uuid, _| live(uuid));
    }

    /// Drop entries for connections absent from `snapshot`. No-op unless the
    /// snapshot is newer than the last one pruned against.
    pub fn prune(&mut self, snapshot: &Snapshot) -> usize {
        if snapshot.generation <= self.pruned_generation {
            return 0;
        }
        self.pruned_generation = snapshot.generation;

        let before = self.slots.len();
        self.retain(|uuid| snapshot.contains(uuid));
        before - self.slots.len()
    }

    pub fn get(&self, uuid: &str) -> Option<u64> {
        self.slots.get(uuid).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
