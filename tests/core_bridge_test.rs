//! Core Bridge Integration Tests
//!
//! Drives a running bridge with a mailbox core the way an out-of-process
//! network core would.

use anyhow::Result;
use connledger::{
    config::FeedConfig, metrics::LedgerMetrics, Connection, ConnectionLedger, CoreBridge,
    MailboxCore, SortKey,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

fn connection(uuid: &str, up: u64) -> Connection {
    Connection {
        uuid: uuid.to_string(),
        network: "tcp".to_string(),
        src: "10.0.0.9:40000".to_string(),
        dst: "93.184.216.34:443".to_string(),
        host: "example.org".to_string(),
        start: 1_700_000_000_000,
        upload_total: up,
        download_total: 0,
        rule: "proxy".to_string(),
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_close_round_trip_through_mailbox() -> Result<()> {
    let (ledger, close_rx) = ConnectionLedger::new(Arc::new(LedgerMetrics::new()));
    let ledger = Arc::new(ledger);
    let mailbox = Arc::new(MailboxCore::new(16, true));
    let (bridge, handle) = CoreBridge::new(ledger.clone(), mailbox.clone(), close_rx, &FeedConfig::default());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(bridge.run(shutdown_rx));

    let sender = handle.snapshot_sender();
    sender.push(vec![connection("a", 10), connection("b", 20)]).await?;
    wait_until(|| ledger.generation() == 1).await;

    // Closing leaves the entry in place until the core confirms
    assert!(ledger.request_close("a"));
    wait_until(|| mailbox.pending() == 1).await;
    assert!(ledger.get("a").is_some());
    assert_eq!(mailbox.drain(), vec!["a".to_string()]);

    sender.push(vec![connection("b", 25)]).await?;
    wait_until(|| ledger.generation() == 2).await;

    let view = ledger.view(SortKey::Upload, true);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].uuid, "b");
    assert_eq!(view[0].upload_total, 25);

    shutdown_tx.send(())?;
    timeout(Duration::from_secs(2), task).await??;
    Ok(())
}

#[tokio::test]
async fn test_snapshots_apply_in_push_order() -> Result<()> {
    let (ledger, close_rx) = ConnectionLedger::new(Arc::new(LedgerMetrics::new()));
    let ledger = Arc::new(ledger);
    let mailbox = Arc::new(MailboxCore::new(16, true));
    let (bridge, handle) = CoreBridge::new(ledger.clone(), mailbox, close_rx, &FeedConfig::default());

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(bridge.run(shutdown_rx));

    let sender = handle.snapshot_sender();
    for i in 0..10u64 {
        sender.push(vec![connection(&format!("c{}", i), i)]).await?;
    }
    wait_until(|| ledger.generation() == 10).await;
    assert_eq!(ledger.view(SortKey::Start, false)[0].uuid, "c9");

    // Dropping every producer stops the bridge
    drop(sender);
    drop(handle);
    timeout(Duration::from_secs(2), task).await??;
    Ok(())
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() {
    let (ledger, close_rx) = ConnectionLedger::new(Arc::new(LedgerMetrics::new()));
    let mailbox = Arc::new(MailboxCore::new(16, true));
    let config = FeedConfig {
        snapshot_queue: 1,
        ..FeedConfig::default()
    };
    // Bridge is never run, so nothing drains the queue
    let (_bridge, handle) = CoreBridge::new(Arc::new(ledger), mailbox, close_rx, &config);

    let sender = handle.snapshot_sender();
    assert_ok!(sender.try_push(vec![connection("a", 1)]));
    let err = assert_err!(sender.try_push(vec![connection("b", 1)]));
    assert!(err.to_string().contains("full"));
}

#[tokio::test]
async fn test_disabling_tracking_reaches_mailbox() -> Result<()> {
    let (ledger, close_rx) = ConnectionLedger::new(Arc::new(LedgerMetrics::new()));
    let ledger = Arc::new(ledger);
    let mailbox = Arc::new(MailboxCore::new(16, true));
    let (bridge, handle) = CoreBridge::new(ledger.clone(), mailbox.clone(), close_rx, &FeedConfig::default());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(bridge.run(shutdown_rx));

    handle.snapshot_sender().push(vec![connection("a", 1)]).await?;
    wait_until(|| ledger.len() == 1).await;

    handle.set_tracking(false);
    wait_until(|| !mailbox.is_tracking()).await;
    wait_until(|| ledger.is_empty()).await;

    shutdown_tx.send(())?;
    timeout(Duration::from_secs(2), task).await??;
    Ok(())
}

#[tokio::test]
async fn test_snapshot_from_before_reenable_is_discarded() -> Result<()> {
    let (ledger, close_rx) = ConnectionLedger::new(Arc::new(LedgerMetrics::new()));
    let ledger = Arc::new(ledger);
    let mailbox = Arc::new(MailboxCore::new(16, true));
    let (bridge, handle) = CoreBridge::new(ledger.clone(), mailbox.clone(), close_rx, &FeedConfig::default());

    // Queued under the first tracking period, toggled off and on before the bridge runs
    let sender = handle.snapshot_sender();
    assert_ok!(sender.try_push(vec![connection("old", 1)]));
    handle.set_tracking(false);
    handle.set_tracking(true);
    assert_ok!(sender.try_push(vec![connection("new", 2)]));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(bridge.run(shutdown_rx));

    wait_until(|| ledger.get("new").is_some()).await;
    assert!(ledger.get("old").is_none());
    assert_eq!(ledger.len(), 1);
    assert!(mailbox.is_tracking());

    shutdown_tx.send(())?;
    timeout(Duration::from_secs(2), task).await??;
    Ok(())
}
