//! Graceful Shutdown Handling
//!
//! SIGTERM and SIGINT are turned into one broadcast that the core bridge and
//! the management server listen on. Background tasks then get a bounded
//! amount of time to finish.

use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use crate::Result;

/// Shutdown coordinator that manages graceful shutdown process
pub struct ShutdownCoordinator {
    /// Broadcast sender for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// How long tasks may take after the signal
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx, timeout }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every subscriber
    pub fn trigger(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }
    }

    /// Wait for SIGTERM or SIGINT, then signal every subscriber
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        self.trigger();
        Ok(())
    }

    /// Wait for named tasks to finish, aborting whatever outlives the timeout
    pub async fn drain_tasks(&self, tasks: Vec<(&str, JoinHandle<()>)>) -> usize {
        let deadline = Instant::now() + self.timeout;
        let mut aborted = 0;

        for (name, mut handle) in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(())) => debug!("Task finished: {}", name),
                Ok(Err(e)) if e.is_cancelled() => debug!("Task was cancelled: {}", name),
                Ok(Err(e)) => error!("Task {} failed: {}", name, e),
                Err(_) => {
                    warn!("Task {} did not stop within {:?}, aborting", name, self.timeout);
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_shutdown_signal_broadcast() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut first = coordinator.subscribe();
        let mut second = coordinator.subscribe();

        coordinator.trigger();

        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_cooperative_tasks() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut shutdown_rx = coordinator.subscribe();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(Duration::from_secs(10)) => {}
                _ = shutdown_rx.recv() => {}
            }
        });

        coordinator.trigger();
        assert_eq!(coordinator.drain_tasks(vec![("cooperative", task)]).await, 0);
    }

    #[tokio::test]
    async fn test_drain_aborts_stuck_tasks() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
        let stuck = tokio::spawn(async {
            sleep(Duration::from_secs(10)).await;
        });

        coordinator.trigger();
        assert_eq!(coordinator.drain_tasks(vec![("stuck", stuck)]).await, 1);
    }
}
