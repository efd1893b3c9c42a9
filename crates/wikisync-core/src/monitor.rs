use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capability::{modified_file_list_key, CachedStateStore, CapabilityBridge, Services};
use crate::error::MonitorError;
use crate::status::{MonitorState, StatusSnapshot};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);

/// Monitor settings, fixed at construction
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Upper bound for a whole sync batch (None = wait forever)
    pub sync_timeout: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sync_timeout: Some(DEFAULT_SYNC_TIMEOUT),
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sync_timeout = timeout;
        self
    }
}

/// Result of a sync trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Preconditions not met; no service was called
    Skipped,
    /// Every commit-and-sync call finished
    Completed {
        synced: Vec<String>,
        failed: Vec<String>,
    },
    /// The batch failed before any commit-and-sync was issued
    Failed { error: String },
    /// The batch did not finish within the sync timeout
    TimedOut,
}

struct Inner {
    state: MonitorState,
    checked_at: Option<DateTime<Utc>>,
}

/// Polls the host services and keeps the sync status up to date
pub struct SyncStatusMonitor {
    bridge: Arc<CapabilityBridge>,
    store: Arc<dyn CachedStateStore>,
    config: MonitorConfig,
    inner: Mutex<Inner>,
    tx: broadcast::Sender<StatusSnapshot>,
}

impl SyncStatusMonitor {
    pub fn new(
        bridge: Arc<CapabilityBridge>,
        store: Arc<dyn CachedStateStore>,
        config: MonitorConfig,
    ) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            bridge,
            store,
            inner: Mutex::new(Inner {
                state: MonitorState::new(config.poll_interval),
                checked_at: None,
            }),
            config,
            tx,
        }
    }

    /// Subscribe to render notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        StatusSnapshot::from_state(&inner.state, inner.checked_at)
    }

    pub fn state(&self) -> MonitorState {
        self.lock().state.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        // No subscribers is fine
        let _ = self.tx.send(snapshot);
    }

    /// Spawn the polling loop. It runs until the returned handle is stopped
    /// or dropped.
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let interval = self.config.poll_interval;

        let task = tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "Sync status monitor started");
            loop {
                if let Err(e) = monitor.poll_once().await {
                    warn!(error = %e, "Sync status check failed");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Sync status monitor stopped");
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// Run one poll cycle: re-check the bridge, then the git state.
    pub async fn poll_once(&self) -> Result<(), MonitorError> {
        let Some(services) = self.bridge.resolve() else {
            {
                let mut inner = self.lock();
                if !inner.state.needs_setup {
                    debug!("Git services missing, setup required");
                }
                inner.state.needs_setup = true;
            }
            self.notify();
            return Ok(());
        };

        self.lock().state.needs_setup = false;
        self.check_with(&services).await
    }

    /// Recount the modified files of every tracked folder from the cache.
    pub async fn check_git_state(&self) -> Result<(), MonitorError> {
        let services = self.bridge.resolve().ok_or(MonitorError::CapabilityMissing)?;
        self.check_with(&services).await
    }

    async fn check_with(&self, services: &Services) -> Result<(), MonitorError> {
        let folders = services.workspace.list_workspaces().await?;

        let mut pending_count = 0;
        for folder in &folders {
            let key = modified_file_list_key(&folder.path);
            if let Some(text) = self.store.read_text(&key) {
                pending_count += count_cached_files(&folder.path, &text)?;
            }
        }

        {
            let mut inner = self.lock();
            inner.state.pending_count = pending_count;
            inner.state.has_unsynced_commits = pending_count > 0;
            inner.checked_at = Some(Utc::now());
        }

        debug!(folders = folders.len(), pending_count, "Checked git state");
        self.notify();
        Ok(())
    }

    /// Commit and sync every folder with modifications.
    ///
    /// A no-op unless there is unsynced work and no sync is already running.
    /// Failures are logged and reported in the outcome, never returned.
    pub async fn on_sync_triggered(&self) -> SyncOutcome {
        {
            let mut inner = self.lock();
            if inner.state.sync_in_progress || !inner.state.has_unsynced_commits {
                debug!(
                    syncing = inner.state.sync_in_progress,
                    unsynced = inner.state.has_unsynced_commits,
                    "Sync trigger ignored"
                );
                return SyncOutcome::Skipped;
            }
            inner.state.sync_in_progress = true;
        }
        // Resets the flag even if this future is dropped mid-sync
        let _guard = SyncGuard { monitor: self };
        self.notify();

        // A timeout drops the batch; git steps already started run to completion
        let outcome = match self.config.sync_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.sync_all()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "Sync timed out");
                    SyncOutcome::TimedOut
                }
            },
            None => self.sync_all().await,
        };

        info!(?outcome, "Sync finished");
        outcome
    }

    async fn sync_all(&self) -> SyncOutcome {
        let Some(services) = self.bridge.resolve() else {
            warn!("Error syncing: git services are not available");
            return SyncOutcome::Failed {
                error: MonitorError::CapabilityMissing.to_string(),
            };
        };

        let folders = match services.workspace.list_workspaces().await {
            Ok(folders) => folders,
            Err(e) => {
                warn!(error = %e, "Error syncing");
                return SyncOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let lists = join_all(
            folders
                .iter()
                .map(|folder| services.git.get_modified_file_list(&folder.path)),
        )
        .await;

        let mut dirty = Vec::new();
        for (folder, list) in folders.iter().zip(lists) {
            match list {
                Ok(files) if !files.is_empty() => dirty.push(folder),
                Ok(_) => {}
                Err(e) => {
                    warn!(folder = %folder.path, error = %e, "Error syncing");
                    return SyncOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            }
        }

        info!(folders = dirty.len(), "Committing and syncing");
        let git = &services.git;
        let results = join_all(dirty.iter().map(|folder| async move {
            let result = git.commit_and_sync(&folder.path, &folder.remote_url).await;
            (folder.path.clone(), result)
        }))
        .await;

        let mut synced = Vec::new();
        let mut failed = Vec::new();
        for (path, result) in results {
            match result {
                Ok(()) => synced.push(path),
                Err(e) => {
                    warn!(folder = %path, error = %e, "Error syncing");
                    failed.push(path);
                }
            }
        }

        SyncOutcome::Completed { synced, failed }
    }
}

struct SyncGuard<'a> {
    monitor: &'a SyncStatusMonitor,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.monitor.lock().state.sync_in_progress = false;
        self.monitor.notify();
    }
}

/// Length of a cached modified-file list, which must be a JSON array
fn count_cached_files(folder: &str, text: &str) -> Result<usize, MonitorError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| MonitorError::CacheParse {
            folder: folder.to_string(),
            reason: e.to_string(),
        })?;

    match value {
        serde_json::Value::Array(items) => Ok(items.len()),
        other => Err(MonitorError::CacheParse {
            folder: folder.to_string(),
            reason: format!("expected a JSON array, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Owns the polling task of a started monitor
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "Sync status monitor panicked");
                }
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
