//! Configuration Manager

use super::Config;
use crate::connection::SortKey;
use crate::Result;
use anyhow::{Context, bail};
use std::path::Path;
use std::net::SocketAddr;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file. `.yaml`/`.yml` files are parsed as YAML,
    /// everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config = Self::parse(path, &content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config.validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Config> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Ok(serde_yaml::from_str(content)?)
        } else {
            Ok(toml::from_str(content)?)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Ok(bind_addr) = std::env::var("CONNLEDGER_BIND_ADDR") {
            config.server.bind_addr = bind_addr.parse::<SocketAddr>()
                .with_context(|| format!("Invalid CONNLEDGER_BIND_ADDR: {}", bind_addr))?;
        }

        if let Ok(timeout) = std::env::var("CONNLEDGER_SHUTDOWN_TIMEOUT") {
            config.server.shutdown_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid CONNLEDGER_SHUTDOWN_TIMEOUT: {}", timeout))?;
        }

        if let Ok(sort_key) = std::env::var("CONNLEDGER_SORT_KEY") {
            config.view.sort_key = sort_key.parse::<SortKey>()
                .with_context(|| format!("Invalid CONNLEDGER_SORT_KEY: {}", sort_key))?;
        }

        if let Ok(descending) = std::env::var("CONNLEDGER_DESCENDING") {
            config.view.descending = descending.parse::<bool>()
                .with_context(|| format!("Invalid CONNLEDGER_DESCENDING: {}", descending))?;
        }

        if let Ok(log_level) = std::env::var("CONNLEDGER_LOG_LEVEL") {
            config.monitoring.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        self.validate_feed_config()
            .with_context(|| "Feed configuration validation failed")?;

        self.validate_view_config()
            .with_context(|| "View configuration validation failed")?;

        self.validate_monitoring_config()
            .with_context(|| "Monitoring configuration validation failed")?;

        self.validate_management_config()
            .with_context(|| "Management API configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.shutdown_timeout.is_zero() {
            bail!("shutdown_timeout must be greater than 0");
        }

        if self.server.shutdown_timeout.as_secs() > 300 {
            bail!("shutdown_timeout cannot exceed 5 minutes");
        }

        Ok(())
    }

    fn validate_feed_config(&self) -> Result<()> {
        if self.feed.snapshot_queue == 0 {
            bail!("feed.snapshot_queue must be greater than 0");
        }

        if self.feed.close_queue == 0 {
            bail!("feed.close_queue must be greater than 0");
        }

        Ok(())
    }

    fn validate_view_config(&self) -> Result<()> {
        if self.view.default_limit == 0 {
            bail!("view.default_limit must be greater than 0");
        }

        if self.view.default_limit > self.view.max_limit {
            bail!(
                "view.default_limit ({}) cannot exceed view.max_limit ({})",
                self.view.default_limit,
                self.view.max_limit
            );
        }

        Ok(())
    }

    fn validate_monitoring_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.monitoring.log_level.as_str()) {
            bail!("monitoring.log_level must be one of: {}", valid_log_levels.join(", "));
        }

        Ok(())
    }

    fn validate_management_config(&self) -> Result<()> {
        let auth = &self.management_api.auth;
        if !auth.enabled {
            return Ok(());
        }

        let has_key = auth.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false);
        if !has_key && auth.basic_auth.is_none() {
            bail!("management_api.auth is enabled but neither api_key nor basic_auth is set");
        }

        if let Some(basic) = &auth.basic_auth {
            if basic.username.is_empty() || basic.password.is_empty() {
                bail!("management_api.auth.basic_auth requires a username and a password");
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        port: Option<u16>,
        sort: Option<SortKey>,
        descending: Option<bool>,
        no_auth: bool,
    ) {
        if let Some(bind_str) = bind {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.server.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        if let Some(port) = port {
            self.server.bind_addr.set_port(port);
            tracing::info!("CLI override: port set to {}", port);
        }

        if let Some(sort_key) = sort {
            self.view.sort_key = sort_key;
            tracing::info!("CLI override: default sort key set to {}", sort_key);
        }

        if let Some(descending) = descending {
            self.view.descending = descending;
            tracing::info!(
                "CLI override: {} order",
                if descending { "descending" } else { "ascending" }
            );
        }

        if no_auth {
            self.management_api.auth.enabled = false;
            tracing::info!("CLI override: management API authentication disabled");
        }
    }
}
