//! Configuration Hot-Reload Integration Tests

use anyhow::Result;
use connledger::{
    config::{ConfigManager, ConfigWatcher},
    presentation::{TrafficView, ViewPreferences},
    SortKey,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_stream::StreamExt;

fn create_test_config(sort_key: &str, descending: bool) -> String {
    format!(
        r#"
[server]
bind_addr = "127.0.0.1:9190"
shutdown_timeout = "5s"

[view]
sort_key = "{}"
descending = {}
default_limit = 25
max_limit = 500
"#,
        sort_key, descending
    )
}

#[tokio::test]
async fn test_view_follows_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("connledger.toml");
    fs::write(&config_path, create_test_config("start", false))?;

    let watcher = ConfigWatcher::new(config_path.clone())?;
    let view = TrafficView::new(&watcher.get_config().view);
    assert_eq!(view.preferences(), ViewPreferences { sort_key: SortKey::Start, descending: false });

    let mut changes = watcher.subscribe();
    fs::write(&config_path, create_test_config("download", true))?;

    let event = timeout(Duration::from_secs(5), async {
        loop {
            match changes.next().await {
                Some(Ok(event)) if event.config.view.sort_key == SortKey::Download => return Some(event),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await?
    .expect("watcher stopped");

    view.apply_config(&event.config.view);
    assert_eq!(view.preferences(), ViewPreferences { sort_key: SortKey::Download, descending: true });
    Ok(())
}

#[tokio::test]
async fn test_broken_file_keeps_previous_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("connledger.toml");
    fs::write(&config_path, create_test_config("upload", false))?;

    let watcher = ConfigWatcher::new(config_path.clone())?;
    fs::write(&config_path, "[view]\nsort_key = \"speed\"\n")?;

    assert!(watcher.reload().is_err());
    assert_eq!(watcher.get_config().view.sort_key, SortKey::Upload);
    Ok(())
}

#[test]
fn test_yaml_and_toml_agree() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml_path = temp_dir.path().join("ledger.toml");
    let yaml_path = temp_dir.path().join("ledger.yaml");

    fs::write(&toml_path, create_test_config("destination", true))?;
    fs::write(
        &yaml_path,
        r#"
server:
  bind_addr: "127.0.0.1:9190"
  shutdown_timeout: "5s"
view:
  sort_key: destination
  descending: true
  default_limit: 25
  max_limit: 500
"#,
    )?;

    let from_toml = ConfigManager::load_from_file(&toml_path)?;
    let from_yaml = ConfigManager::load_from_file(&yaml_path)?;
    assert_eq!(from_toml.view, from_yaml.view);
    assert_eq!(from_toml.server.shutdown_timeout, Duration::from_secs(5));
    Ok(())
}
