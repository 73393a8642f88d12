//! Mailbox core for out-of-process network cores
//!
//! Close requests are parked here until the core collects them over the
//! management API.

use super::types::NetworkCore;
use crate::Result;
use anyhow::{anyhow, bail};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

pub struct MailboxCore {
    pending: Mutex<VecDeque<String>>,
    capacity: usize,
    tracking: AtomicBool,
}

impl MailboxCore {
    pub fn new(capacity: usize, tracking: bool) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            capacity,
            tracking: AtomicBool::new(tracking),
        }
    }

    /// Take every pending close request, oldest first
    pub fn drain(&self) -> Vec<String> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Whether the core should currently be pushing snapshots
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }
}

impl NetworkCore for MailboxCore {
    fn close_connection(&self, uuid: &str) -> Result<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| anyhow!("Close mailbox lock poisoned"))?;

        if pending.iter().any(|queued| queued == uuid) {
            debug!(uuid, "Close request already queued");
            return Ok(());
        }

        if pending.len() >= self.capacity {
            bail!("Close mailbox is full ({} pending)", pending.len());
        }

        pending.push_back(uuid.to_string());
        Ok(())
    }

    fn set_tracking(&self, enabled: bool) {
        self.tracking.store(enabled, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_dedupe_and_drain() {
        let mailbox = MailboxCore::new(4, true);
        mailbox.close_connection("a").unwrap();
        mailbox.close_connection("b").unwrap();
        mailbox.close_connection("a").unwrap();

        assert_eq!(mailbox.pending(), 2);
        assert_eq!(mailbox.drain(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(mailbox.pending(), 0);
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn test_full_mailbox_rejects() {
        let mailbox = MailboxCore::new(1, true);
        mailbox.close_connection("a").unwrap();
        assert!(mailbox.close_connection("b").is_err());
    }

    #[test]
    fn test_tracking_flag() {
        let mailbox = MailboxCore::new(1, false);
        assert!(!mailbox.is_tracking());
        mailbox.set_tracking(true);
        assert!(mailbox.is_tracking());
    }
}
