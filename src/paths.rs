//! Application path management for portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Working directory**: a `xidi.yaml` in the current directory wins, which keeps
//!   `xidi check` and friends working from a game's install folder.
//! - **Portable mode**: a `.portable` marker next to the executable keeps the
//!   configuration and logs beside it.
//! - **Installed mode** (default): the user configuration directory, `%APPDATA%\Xidi` on
//!   Windows.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used in installed mode
const APP_NAME: &str = "Xidi";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "xidi.yaml";

/// Marker that selects portable mode
const PORTABLE_MARKER: &str = ".portable";

/// Where the configuration file and logs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether files live next to the executable or working directory
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialised, so nothing here logs.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self::resolve(&cwd, &exe_dir, dirs::config_dir())
    }

    /// Resolve paths from explicit locations.
    ///
    /// # Arguments
    /// * `cwd` - Current working directory
    /// * `exe_dir` - Directory holding the executable
    /// * `user_config_dir` - Platform configuration directory, if the platform has one
    pub fn resolve(cwd: &Path, exe_dir: &Path, user_config_dir: Option<PathBuf>) -> Self {
        let cwd_config = cwd.join(CONFIG_FILE_NAME);
        if cwd_config.exists() {
            return Self::portable_in(cwd);
        }

        if exe_dir.join(PORTABLE_MARKER).exists() {
            return Self::portable_in(exe_dir);
        }

        let base = user_config_dir.unwrap_or_else(|| exe_dir.to_path_buf()).join(APP_NAME);
        Self {
            config: base.join(CONFIG_FILE_NAME),
            logs_dir: base.join("logs"),
            is_portable: false,
        }
    }

    fn portable_in(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE_NAME),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the configuration and log directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)
                .with_context(|| format!("Failed to create {}", self.logs_dir.display()))?;
        }

        let base = self.base_dir();
        if !base.exists() {
            debug!("Creating config directory: {}", base.display());
            std::fs::create_dir_all(&base)
                .with_context(|| format!("Failed to create {}", base.display()))?;
        }

        Ok(())
    }
}
