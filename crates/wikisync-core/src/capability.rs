use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::ServiceError;

/// Key prefix of the cached modified-file-list records
pub const MODIFIED_FILE_LIST_PREFIX: &str = "scm-modified-file-list/";

/// Store key holding the cached modified-file list of `folder`
pub fn modified_file_list_key(folder: &str) -> String {
    format!("{}{}", MODIFIED_FILE_LIST_PREFIX, folder)
}

/// A tracked wiki folder paired with its git remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    pub path: String,
    pub remote_url: String,
}

impl FolderDescriptor {
    pub fn new(path: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote_url: remote_url.into(),
        }
    }
}

/// Lists the wiki folders the host tracks
#[async_trait]
pub trait WorkspaceService: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<FolderDescriptor>, ServiceError>;
}

/// Git operations performed on behalf of the monitor
#[async_trait]
pub trait GitService: Send + Sync {
    /// Files with uncommitted changes in `folder`
    async fn get_modified_file_list(&self, folder: &str) -> Result<Vec<String>, ServiceError>;

    /// Commit everything in `folder` and sync it with `remote_url`
    async fn commit_and_sync(&self, folder: &str, remote_url: &str) -> Result<(), ServiceError>;
}

/// Read-only view of the host's text key-value state
pub trait CachedStateStore: Send + Sync {
    fn read_text(&self, key: &str) -> Option<String>;
}

/// Both services, resolved from a ready bridge
#[derive(Clone)]
pub struct Services {
    pub workspace: Arc<dyn WorkspaceService>,
    pub git: Arc<dyn GitService>,
}

/// Holds the host services, which may be installed after the monitor starts.
///
/// An empty slot means the host has not injected that capability yet. The
/// monitor resolves the bridge on every poll, so late installation is picked
/// up on the next cycle.
#[derive(Default)]
pub struct CapabilityBridge {
    workspace: RwLock<Option<Arc<dyn WorkspaceService>>>,
    git: RwLock<Option<Arc<dyn GitService>>>,
}

impl CapabilityBridge {
    /// A bridge with nothing installed
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge that is ready from the start
    pub fn with_services(workspace: Arc<dyn WorkspaceService>, git: Arc<dyn GitService>) -> Self {
        let bridge = Self::new();
        bridge.install_workspace(workspace);
        bridge.install_git(git);
        bridge
    }

    pub fn install_workspace(&self, service: Arc<dyn WorkspaceService>) {
        *self.workspace.write().unwrap_or_else(|e| e.into_inner()) = Some(service);
    }

    pub fn install_git(&self, service: Arc<dyn GitService>) {
        *self.git.write().unwrap_or_else(|e| e.into_inner()) = Some(service);
    }

    /// Both services, or `None` while either is missing
    pub fn resolve(&self) -> Option<Services> {
        let workspace = self
            .workspace
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()?;
        let git = self.git.read().unwrap_or_else(|e| e.into_inner()).clone()?;
        Some(Services { workspace, git })
    }

    pub fn is_ready(&self) -> bool {
        self.resolve().is_some()
    }
}
