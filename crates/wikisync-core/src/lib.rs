//! # wikisync-core
//!
//! Sync status monitoring for git-backed wiki folders.
//!
//! The monitor polls host-provided services, counts the modified files of
//! every tracked folder, and publishes a status the presentation layer turns
//! into a button: icon, label, badge and enabled state.
//!
//! ## Key Types
//!
//! - [`SyncStatusMonitor`] - Polling loop, git state check and sync trigger
//! - [`SyncStatus`] - The five button states, derived from [`MonitorState`]
//! - [`CapabilityBridge`] - Host services that may be installed late
//! - [`StatusSnapshot`] - Render notification sent to subscribers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wikisync_core::{CapabilityBridge, MonitorConfig, SyncStatusMonitor};
//!
//! let bridge = Arc::new(CapabilityBridge::new());
//! let monitor = Arc::new(SyncStatusMonitor::new(bridge.clone(), store, MonitorConfig::default()));
//! let handle = monitor.start();
//!
//! // Later, once the host is ready
//! bridge.install_workspace(workspaces);
//! bridge.install_git(git);
//!
//! let mut updates = monitor.subscribe();
//! while let Ok(snapshot) = updates.recv().await {
//!     println!("{}", snapshot.label());
//! }
//! ```
//!
//! ## Status Priority
//!
//! Setup required, then syncing, then fully synced, push pending, and
//! finally commit-and-push pending with a file count badge.

mod capability;
mod error;
mod monitor;
mod status;

pub use capability::{
    modified_file_list_key, CachedStateStore, CapabilityBridge, FolderDescriptor, GitService,
    Services, WorkspaceService, MODIFIED_FILE_LIST_PREFIX,
};
pub use error::{MonitorError, ServiceError};
pub use monitor::{
    MonitorConfig, MonitorHandle, SyncOutcome, SyncStatusMonitor, DEFAULT_POLL_INTERVAL,
    DEFAULT_SYNC_TIMEOUT,
};
pub use status::{MonitorState, StatusIcon, StatusSnapshot, SyncStatus};
