//! connledger - live connection ledger service
//!
//! Accepts connection snapshots from a network core over the management API,
//! serves the sorted connection view and hands close requests back to the core.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connledger::{
    config::{ConfigManager, ConfigWatcher},
    management::{AppState, ManagementServer},
    metrics::LedgerMetrics,
    presentation::TrafficView,
    ConnectionLedger, CoreBridge, MailboxCore, ShutdownCoordinator, SortKey,
};

/// CLI arguments for connledger
#[derive(Parser, Debug)]
#[command(name = "connledger")]
#[command(about = "Live connection ledger for a proxy network core")]
#[command(version)]
#[command(long_about = "
connledger keeps the list of connections currently open in a network core.
The core pushes full snapshots and collects close requests over the
management API; operators read the sorted view from the same API.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  CONNLEDGER_BIND_ADDR         - Management API bind address (e.g., 127.0.0.1:9190)
  CONNLEDGER_SHUTDOWN_TIMEOUT  - Shutdown timeout (e.g., 10s)
  CONNLEDGER_SORT_KEY          - Default sort key (start, id, source, destination, upload, download)
  CONNLEDGER_DESCENDING        - Default to descending order (true/false)
  CONNLEDGER_LOG_LEVEL         - Log level (trace, debug, info, warn, error)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "connledger.toml", help = "Path to configuration file (TOML or YAML)")]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Bind address (e.g., 127.0.0.1:9190)")]
    pub bind: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(short, long, help = "Port to bind to")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Default sort key of the connection view
    #[arg(long, help = "Default sort key")]
    pub sort: Option<SortKey>,

    /// Sort descending by default
    #[arg(long, conflicts_with = "ascending", help = "Sort descending by default")]
    pub descending: bool,

    /// Sort ascending by default, overriding the config file
    #[arg(long, help = "Sort ascending by default")]
    pub ascending: bool,

    /// Disable management API authentication (overrides config file)
    #[arg(long, help = "Disable management API authentication")]
    pub no_auth: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

impl CliArgs {
    /// Direction requested on the command line, if any
    fn sort_direction(&self) -> Option<bool> {
        match (self.descending, self.ascending) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Configuration is needed before tracing so the file's log level applies
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    config.merge_with_cli_args(
        args.bind.as_deref(),
        args.port,
        args.sort,
        args.sort_direction(),
        args.no_auth,
    );

    init_tracing(&args, &config.monitoring.log_level)?;

    info!("Starting connledger v{}", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        info!("Config file {} not found, using environment and defaults", args.config.display());
    }

    config
        .validate()
        .context("Final configuration validation failed")?;

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Bind address: {}", config.server.bind_addr);
        info!("  Shutdown timeout: {:?}", config.server.shutdown_timeout);
        info!("  Snapshot queue: {}", config.feed.snapshot_queue);
        info!("  Close queue: {}", config.feed.close_queue);
        info!("  Default order: {} (descending: {})", config.view.sort_key, config.view.descending);
        info!(
            "  Authentication: {}",
            if config.management_api.auth.enabled { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    let shutdown_coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);

    let metrics = Arc::new(LedgerMetrics::new());
    let (ledger, close_requests) = ConnectionLedger::new(metrics);
    let ledger = Arc::new(ledger);

    let mailbox = Arc::new(MailboxCore::new(config.feed.close_queue, config.feed.tracking_on_start));
    let (bridge, bridge_handle) = CoreBridge::new(
        Arc::clone(&ledger),
        mailbox.clone(),
        close_requests,
        &config.feed,
    );
    let bridge_task = tokio::spawn(bridge.run(shutdown_coordinator.subscribe()));

    let view = Arc::new(TrafficView::new(&config.view));

    // Hot reload of the [view] section
    let watcher_task = if args.config.exists() {
        match ConfigWatcher::new(args.config.clone()) {
            Ok(watcher) => {
                let view = Arc::clone(&view);
                let mut shutdown_rx = shutdown_coordinator.subscribe();
                Some(tokio::spawn(async move {
                    let mut changes = watcher.subscribe();
                    loop {
                        tokio::select! {
                            change = changes.next() => match change {
                                Some(Ok(event)) => {
                                    view.apply_config(&event.config.view);
                                    info!("Applied view settings from {}", event.file_path.display());
                                }
                                Some(Err(e)) => warn!("Missed configuration change: {}", e),
                                None => break,
                            },
                            _ = shutdown_rx.recv() => break,
                        }
                    }
                }))
            }
            Err(e) => {
                warn!("Configuration hot reload unavailable: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let app_state = AppState {
        ledger: Arc::clone(&ledger),
        view,
        bridge: bridge_handle,
        mailbox: Some(mailbox),
        prometheus_enabled: config.monitoring.prometheus_enabled,
        start_time: SystemTime::now(),
    };

    let server = ManagementServer::new(
        config.server.bind_addr,
        app_state,
        config.management_api.auth.clone(),
    );
    let server_shutdown = shutdown_coordinator.subscribe();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.start(server_shutdown).await {
            error!("Management API server error: {:#}", e);
        }
    });

    info!("connledger started, press Ctrl+C or send SIGTERM to stop");

    if let Err(e) = shutdown_coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
        shutdown_coordinator.trigger();
    }

    info!("Initiating graceful shutdown...");

    let mut tasks = vec![("core bridge", bridge_task), ("management API", server_task)];
    if let Some(task) = watcher_task {
        tasks.push(("config watcher", task));
    }
    let aborted = shutdown_coordinator.drain_tasks(tasks).await;
    if aborted > 0 {
        warn!("{} task(s) were aborted during shutdown", aborted);
    }

    info!(
        generation = ledger.generation(),
        connections = ledger.len(),
        "Shutdown complete"
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, configured_level: &str) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_deref().unwrap_or(configured_level)
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
