//! Hot reload of the mapper configuration.
//!
//! Every reload is turned into a ready-to-use [`MapperRegistry`] before anything downstream sees
//! it. A file that fails to parse, names an unknown mapper or contains a bad mapping string never
//! replaces the registry currently in use.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;
use crate::controller::registry::MapperRegistry;

/// Delay between a write notification and the reload, so editors can finish writing
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// A configuration together with the registry built from it.
#[derive(Clone)]
pub struct LoadedConfig {
    pub config: Arc<AppConfig>,
    pub registry: Arc<MapperRegistry>,
}

impl LoadedConfig {
    /// Parse `contents` and build its mapper registry.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config = AppConfig::from_yaml(contents)?;
        let registry = config
            .build_registry()
            .context("Failed to build mapper registry")?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        })
    }

    async fn load(path: &str) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }
}

/// Watches the configuration file and yields each reload that produced a usable registry
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<LoadedConfig>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it.
    ///
    /// Reloads identical to the configuration last forwarded are dropped, since a single save
    /// often raises several modify events.
    pub async fn new(config_path: String) -> Result<(Self, LoadedConfig)> {
        let (tx, rx) = mpsc::channel(10);

        let initial = LoadedConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        info!(
            "Loaded {} mappers from {} (default {})",
            initial.registry.len(),
            config_path,
            initial.registry.default_mapper().name()
        );

        let current = Arc::new(Mutex::new(initial.config.clone()));
        let config_path_clone = config_path.clone();

        // notify callbacks run on their own OS thread
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_)) {
                    return;
                }
                debug!("Config file modified: {:?}", event.paths);

                let config_path = config_path_clone.clone();
                let current = current.clone();
                let tx = tx.clone();
                runtime_handle.spawn(async move {
                    tokio::time::sleep(RELOAD_DEBOUNCE).await;

                    let loaded = match LoadedConfig::load(&config_path).await {
                        Ok(loaded) => loaded,
                        Err(e) => {
                            warn!("Rejected config reload (keeping current mappers): {:#}", e);
                            return;
                        }
                    };

                    {
                        let mut current = current.lock();
                        if **current == *loaded.config {
                            debug!("Config contents unchanged, skipping reload");
                            return;
                        }
                        *current = loaded.config.clone();
                    }

                    info!(
                        "Configuration reloaded: {} mappers, default {}",
                        loaded.registry.len(),
                        loaded.registry.default_mapper().name()
                    );
                    if let Err(e) = tx.send(loaded).await {
                        error!("Failed to send config update: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Watch error: {}", e);
            }
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        debug!("Config file watcher started for: {}", config_path);

        Ok((Self { _watcher: watcher, rx }, initial))
    }

    /// Wait for the next accepted reload. None once the watcher has shut down.
    pub async fn next_config(&mut self) -> Option<LoadedConfig> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CUSTOM: &str = "\
mapper:
  default: Custom
custom_mappers:
  - name: Custom
    template: StandardGamepad
    elements:
      ButtonA: Button(5)
";

    #[test]
    fn test_loaded_config_builds_registry() {
        let loaded = LoadedConfig::from_yaml(CUSTOM).unwrap();
        assert_eq!(loaded.registry.default_mapper().name(), "Custom");
        assert!(loaded.registry.contains("StandardGamepad"));

        assert!(LoadedConfig::from_yaml("mapper:\n  default: Missing\n").is_err());
        assert!(LoadedConfig::from_yaml(&CUSTOM.replace("Button(5)", "Button(500)")).is_err());
    }

    #[tokio::test]
    async fn test_config_watcher_reloads() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("xidi.yaml");

        fs::write(&config_path, "mapper:\n  default: StandardGamepad\n")?;

        let (mut watcher, initial) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
        assert_eq!(initial.registry.default_mapper().name(), "StandardGamepad");

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, "mapper:\n  default: XInputNative\n")?;

        let reloaded = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;
        if let Some(reloaded) = reloaded {
            assert_eq!(reloaded.config.mapper.default, "XInputNative");
            assert_eq!(reloaded.registry.default_mapper().name(), "XInputNative");
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_unusable_reload_is_not_forwarded() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("xidi.yaml");

        fs::write(&config_path, "mapper:\n  default: StandardGamepad\n")?;
        let (mut watcher, _) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, CUSTOM.replace("Button(5)", "Button(500)"))?;

        let result = tokio::time::timeout(Duration::from_millis(500), watcher.next_config()).await;
        assert!(result.is_err(), "a config with a bad mapping string was forwarded");

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_initial_config_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("xidi.yaml");
        fs::write(&config_path, "mapper:\n  default: Missing\n")?;

        let result = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await;
        assert!(result.is_err());
        Ok(())
    }
}
