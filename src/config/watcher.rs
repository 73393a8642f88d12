//! Configuration File Watcher
//!
//! Reloads the configuration file when it changes on disk and broadcasts the
//! new value. Invalid files are logged and the previous configuration is kept.

use super::{Config, ConfigManager};
use crate::Result;
use anyhow::{Context, bail};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChangeEvent {
    pub config: Arc<Config>,
    pub timestamp: std::time::SystemTime,
    pub file_path: PathBuf,
}

/// Configuration file watcher
pub struct ConfigWatcher {
    config_path: PathBuf,
    current_config: Arc<RwLock<Arc<Config>>>,
    change_sender: broadcast::Sender<ConfigChangeEvent>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Create a new configuration watcher
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let (change_sender, _) = broadcast::channel(16);

        let initial_config = ConfigManager::load_from_file(&config_path)?;
        let current_config = Arc::new(RwLock::new(Arc::new(initial_config)));

        let sender_clone = change_sender.clone();
        let config_clone = current_config.clone();
        let path_clone = config_path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => Self::handle_file_event(event, &path_clone, &config_clone, &sender_clone),
                    Err(e) => error!("File watcher error: {}", e),
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        // Watching the directory survives editors that replace the file
        match config_path.parent() {
            Some(parent_dir) => {
                let parent_dir = if parent_dir.as_os_str().is_empty() { Path::new(".") } else { parent_dir };
                watcher
                    .watch(parent_dir, RecursiveMode::NonRecursive)
                    .with_context(|| format!("Failed to watch directory: {}", parent_dir.display()))?;
                info!("Started watching configuration directory: {}", parent_dir.display());
            }
            None => bail!("Configuration file has no parent directory: {}", config_path.display()),
        }

        Ok(Self {
            config_path,
            current_config,
            change_sender,
            _watcher: watcher,
        })
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        match self.current_config.read() {
            Ok(config) => Arc::clone(&config),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> BroadcastStream<ConfigChangeEvent> {
        BroadcastStream::new(self.change_sender.subscribe())
    }

    /// Force reload the configuration
    pub fn reload(&self) -> Result<()> {
        info!("Force reloading configuration from: {}", self.config_path.display());
        let new_config = ConfigManager::load_from_file(&self.config_path)?;
        Self::publish(new_config, &self.config_path, &self.current_config, &self.change_sender);
        Ok(())
    }

    fn publish(
        new_config: Config,
        config_path: &Path,
        current_config: &RwLock<Arc<Config>>,
        sender: &broadcast::Sender<ConfigChangeEvent>,
    ) {
        let config_arc = Arc::new(new_config);

        match current_config.write() {
            Ok(mut current) => *current = Arc::clone(&config_arc),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&config_arc),
        }

        let event = ConfigChangeEvent {
            config: config_arc,
            timestamp: std::time::SystemTime::now(),
            file_path: config_path.to_path_buf(),
        };

        if sender.send(event).is_err() {
            debug!("No subscribers for config change event");
        }

        info!("Configuration reloaded successfully");
    }

    fn handle_file_event(
        event: Event,
        config_path: &Path,
        current_config: &RwLock<Arc<Config>>,
        sender: &broadcast::Sender<ConfigChangeEvent>,
    ) {
        debug!("File event: {:?}", event);

        let affects_config = event.paths.iter().any(|path| {
            path.file_name() == config_path.file_name()
        });

        if !affects_config {
            return;
        }

        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => {
                info!("Configuration file changed, reloading...");

                // Give the writer a moment to finish
                std::thread::sleep(std::time::Duration::from_millis(100));

                match ConfigManager::load_from_file(config_path) {
                    Ok(new_config) => Self::publish(new_config, config_path, current_config, sender),
                    Err(e) => {
                        error!("Failed to reload configuration, keeping current config: {:#}", e);
                    }
                }
            }
            EventKind::Remove(_) => {
                warn!("Configuration file was removed: {}", config_path.display());
            }
            _ => {
                debug!("Ignoring file event type: {:?}", event.kind);
            }
        }
    }
}
