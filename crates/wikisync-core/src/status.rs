use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mutable state of a sync status monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    /// The git or workspace service is not available
    pub needs_setup: bool,
    /// Delay between poll cycles
    pub poll_interval: Duration,
    /// Modified files across all tracked folders
    pub pending_count: usize,
    /// At least one folder has modifications
    pub has_unsynced_commits: bool,
    /// A commit-and-sync is in flight
    pub sync_in_progress: bool,
}

impl MonitorState {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            needs_setup: false,
            poll_interval,
            pending_count: 0,
            has_unsynced_commits: false,
            sync_in_progress: false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::derive(self)
    }
}

/// What the sync button shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    SetupRequired,
    Syncing,
    FullySynced,
    PushPending,
    CommitAndPushPending,
}

/// Icon asset for a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusIcon {
    GitSync,
    GitPullRequest,
}

impl SyncStatus {
    /// Map monitor state to a status. The checks run in priority order, so
    /// setup beats syncing, and syncing beats any pending work.
    pub fn derive(state: &MonitorState) -> Self {
        if state.needs_setup {
            SyncStatus::SetupRequired
        } else if state.sync_in_progress {
            SyncStatus::Syncing
        } else if state.pending_count == 0 && !state.has_unsynced_commits {
            SyncStatus::FullySynced
        } else if state.pending_count == 0 && state.has_unsynced_commits {
            SyncStatus::PushPending
        } else {
            SyncStatus::CommitAndPushPending
        }
    }

    /// Whether clicking the button may start a sync
    pub fn is_enabled(&self) -> bool {
        matches!(
            self,
            SyncStatus::PushPending | SyncStatus::CommitAndPushPending
        )
    }

    pub fn icon(&self) -> StatusIcon {
        match self {
            SyncStatus::SetupRequired | SyncStatus::Syncing | SyncStatus::FullySynced => {
                StatusIcon::GitSync
            }
            SyncStatus::PushPending | SyncStatus::CommitAndPushPending => {
                StatusIcon::GitPullRequest
            }
        }
    }

    /// Count shown over the icon, only when files wait to be committed
    pub fn badge(&self, pending_count: usize) -> Option<usize> {
        match self {
            SyncStatus::CommitAndPushPending => Some(pending_count),
            _ => None,
        }
    }

    pub fn label(&self, pending_count: usize) -> String {
        match self {
            SyncStatus::SetupRequired => "Git sync needs to be set up".to_string(),
            SyncStatus::Syncing => "Syncing to the cloud".to_string(),
            SyncStatus::FullySynced => "Fully synced to the cloud".to_string(),
            SyncStatus::PushPending => "Waiting to push to the cloud".to_string(),
            SyncStatus::CommitAndPushPending => {
                format!("{} file(s) waiting to commit and push", pending_count)
            }
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::SetupRequired => write!(f, "setup-required"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::FullySynced => write!(f, "fully-synced"),
            SyncStatus::PushPending => write!(f, "push-pending"),
            SyncStatus::CommitAndPushPending => write!(f, "commit-and-push-pending"),
        }
    }
}

/// Render notification published to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: SyncStatus,
    pub pending_count: usize,
    pub needs_setup: bool,
    pub has_unsynced_commits: bool,
    pub sync_in_progress: bool,
    /// When the last git state check completed
    pub checked_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn from_state(state: &MonitorState, checked_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status: state.status(),
            pending_count: state.pending_count,
            needs_setup: state.needs_setup,
            has_unsynced_commits: state.has_unsynced_commits,
            sync_in_progress: state.sync_in_progress,
            checked_at,
        }
    }

    pub fn badge(&self) -> Option<usize> {
        self.status.badge(self.pending_count)
    }

    pub fn label(&self) -> String {
        self.status.label(self.pending_count)
    }
}
