//! Configuration file support for wikisync.
//!
//! Loads `wikisync.toml` from the working directory or an explicit path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wikisync_core::{
    FolderDescriptor, MonitorConfig, ServiceError, WorkspaceService, DEFAULT_POLL_INTERVAL,
    DEFAULT_SYNC_TIMEOUT,
};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "wikisync.toml";

/// Configuration loaded from `wikisync.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WikiSyncConfig {
    /// Delay between status checks (default 1s)
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    /// Limit for one sync batch (default 5m, "0s" disables it)
    #[serde(default, with = "humantime_serde")]
    pub sync_timeout: Option<Duration>,
    /// Where cached modified-file lists are kept
    pub state_dir: Option<PathBuf>,
    /// Message for commits made by sync
    pub commit_message: Option<String>,
    /// git executable to run
    pub git_binary: Option<PathBuf>,
    /// Tracked wiki folders
    #[serde(default, rename = "workspace")]
    pub workspaces: Vec<WorkspaceEntry>,
}

/// A `[[workspace]]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceEntry {
    pub folder: PathBuf,
    pub remote_url: String,
}

impl WikiSyncConfig {
    /// Load configuration from a file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: WikiSyncConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Load `path`, or `wikisync.toml` in `working_dir`, falling back to
    /// defaults when the file does not exist.
    pub fn load_or_default(path: Option<&Path>, working_dir: &Path) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => working_dir.join(CONFIG_FILE_NAME),
        };
        Ok(Self::load(&config_path)?.unwrap_or_default())
    }

    /// Monitor settings; `interval_override` wins over the file.
    pub fn monitor_config(&self, interval_override: Option<Duration>) -> MonitorConfig {
        let poll_interval = interval_override
            .or(self.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let sync_timeout = match self.sync_timeout {
            Some(timeout) if timeout.is_zero() => None,
            Some(timeout) => Some(timeout),
            None => Some(DEFAULT_SYNC_TIMEOUT),
        };

        MonitorConfig::default()
            .with_poll_interval(poll_interval)
            .with_sync_timeout(sync_timeout)
    }

    pub fn folders(&self) -> Vec<FolderDescriptor> {
        self.workspaces
            .iter()
            .map(|w| FolderDescriptor::new(w.folder.display().to_string(), w.remote_url.clone()))
            .collect()
    }
}

/// Workspace list taken from the config file
pub struct ConfiguredWorkspaces {
    folders: Vec<FolderDescriptor>,
}

impl ConfiguredWorkspaces {
    pub fn new(folders: Vec<FolderDescriptor>) -> Self {
        Self { folders }
    }

    pub fn folders(&self) -> &[FolderDescriptor] {
        &self.folders
    }
}

#[async_trait]
impl WorkspaceService for ConfiguredWorkspaces {
    async fn list_workspaces(&self) -> Result<Vec<FolderDescriptor>, ServiceError> {
        Ok(self.folders.clone())
    }
}
