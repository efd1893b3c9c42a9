use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use wikisync_core::{
    modified_file_list_key, CachedStateStore, CapabilityBridge, FolderDescriptor, GitService,
    MonitorConfig, MonitorError, ServiceError, SyncOutcome, SyncStatus, SyncStatusMonitor,
    WorkspaceService,
};

// ============================================================
// Fakes
// ============================================================

#[derive(Default)]
struct FakeWorkspaces {
    folders: Vec<FolderDescriptor>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl WorkspaceService for FakeWorkspaces {
    async fn list_workspaces(&self) -> Result<Vec<FolderDescriptor>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::Unavailable("bridge not injected".to_string()));
        }
        Ok(self.folders.clone())
    }
}

#[derive(Default)]
struct FakeGit {
    lists: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    hang: bool,
    gate: Option<Arc<Notify>>,
    list_calls: AtomicUsize,
    sync_calls: Mutex<Vec<String>>,
}

impl FakeGit {
    fn sync_calls(&self) -> Vec<String> {
        self.sync_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitService for FakeGit {
    async fn get_modified_file_list(&self, folder: &str) -> Result<Vec<String>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lists.get(folder).cloned().unwrap_or_default())
    }

    async fn commit_and_sync(&self, folder: &str, _remote_url: &str) -> Result<(), ServiceError> {
        self.sync_calls.lock().unwrap().push(folder.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(folder) {
            return Err(ServiceError::Sync(format!("push rejected for {}", folder)));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MapStore {
    records: Mutex<HashMap<String, String>>,
}

impl MapStore {
    fn put(&self, folder: &str, text: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(modified_file_list_key(folder), text.to_string());
    }
}

impl CachedStateStore for MapStore {
    fn read_text(&self, key: &str) -> Option<String> {
        self.records.lock().unwrap().get(key).cloned()
    }
}

fn folders(paths: &[&str]) -> Vec<FolderDescriptor> {
    paths
        .iter()
        .map(|p| FolderDescriptor::new(*p, format!("https://example.com{}.git", p)))
        .collect()
}

fn git_with(lists: &[(&str, &[&str])]) -> FakeGit {
    FakeGit {
        lists: lists
            .iter()
            .map(|(folder, files)| {
                (
                    folder.to_string(),
                    files.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect(),
        ..Default::default()
    }
}

fn monitor_with(
    workspaces: Arc<FakeWorkspaces>,
    git: Arc<FakeGit>,
    store: Arc<MapStore>,
    config: MonitorConfig,
) -> Arc<SyncStatusMonitor> {
    let bridge = Arc::new(CapabilityBridge::with_services(workspaces, git));
    Arc::new(SyncStatusMonitor::new(bridge, store, config))
}

fn assert_unsynced_invariant(monitor: &SyncStatusMonitor) {
    let state = monitor.state();
    assert_eq!(state.has_unsynced_commits, state.pending_count > 0);
}

// ============================================================
// check_git_state
// ============================================================

#[tokio::test]
async fn test_check_with_no_folders_is_fully_synced() {
    let monitor = monitor_with(
        Arc::new(FakeWorkspaces::default()),
        Arc::new(FakeGit::default()),
        Arc::new(MapStore::default()),
        MonitorConfig::default(),
    );

    monitor.check_git_state().await.unwrap();

    let state = monitor.state();
    assert_eq!(state.pending_count, 0);
    assert!(!state.has_unsynced_commits);
    assert_eq!(state.status(), SyncStatus::FullySynced);
    assert!(monitor.snapshot().checked_at.is_some());
}

#[tokio::test]
async fn test_check_sums_cached_lists() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);
    store.put("/wiki/b", "[]");

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a", "/wiki/b"]),
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
        store,
        MonitorConfig::default(),
    );

    monitor.check_git_state().await.unwrap();

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.pending_count, 1);
    assert!(snapshot.has_unsynced_commits);
    assert_eq!(snapshot.status, SyncStatus::CommitAndPushPending);
    assert_eq!(snapshot.badge(), Some(1));
}

#[tokio::test]
async fn test_check_skips_folders_without_record() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md", "b.md", "c.md"]"#);

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a", "/wiki/uncached"]),
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
        store,
        MonitorConfig::default(),
    );

    monitor.check_git_state().await.unwrap();
    assert_eq!(monitor.state().pending_count, 3);
}

#[tokio::test]
async fn test_check_recount_keeps_invariant() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md", "b.md"]"#);

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a"]),
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
        store.clone(),
        MonitorConfig::default(),
    );

    monitor.check_git_state().await.unwrap();
    assert_unsynced_invariant(&monitor);
    assert_eq!(monitor.state().pending_count, 2);

    store.put("/wiki/a", "[]");
    monitor.check_git_state().await.unwrap();
    assert_unsynced_invariant(&monitor);
    assert_eq!(monitor.state().status(), SyncStatus::FullySynced);
}

#[tokio::test]
async fn test_malformed_record_fails_the_check() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a", "/wiki/broken"]),
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
        store.clone(),
        MonitorConfig::default(),
    );

    monitor.check_git_state().await.unwrap();
    assert_eq!(monitor.state().pending_count, 1);

    store.put("/wiki/broken", "{not json");
    let err = monitor.check_git_state().await.unwrap_err();
    assert!(matches!(err, MonitorError::CacheParse { ref folder, .. } if folder == "/wiki/broken"));

    // The failed check leaves the last good state in place
    assert_eq!(monitor.state().pending_count, 1);
}

#[tokio::test]
async fn test_listing_failure_propagates() {
    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            fail: true,
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
        Arc::new(MapStore::default()),
        MonitorConfig::default(),
    );

    let err = monitor.check_git_state().await.unwrap_err();
    assert!(matches!(
        err,
        MonitorError::Service(ServiceError::Unavailable(_))
    ));
}

// ============================================================
// Capability availability
// ============================================================

#[tokio::test]
async fn test_missing_services_require_setup() {
    let bridge = Arc::new(CapabilityBridge::new());
    let monitor = SyncStatusMonitor::new(
        bridge.clone(),
        Arc::new(MapStore::default()),
        MonitorConfig::default(),
    );

    monitor.poll_once().await.unwrap();
    assert!(monitor.state().needs_setup);
    assert_eq!(monitor.snapshot().status, SyncStatus::SetupRequired);

    let err = monitor.check_git_state().await.unwrap_err();
    assert!(matches!(err, MonitorError::CapabilityMissing));
}

#[tokio::test]
async fn test_setup_cycle_makes_no_service_calls() {
    let workspaces = Arc::new(FakeWorkspaces::default());
    let bridge = Arc::new(CapabilityBridge::new());
    // Only half the bridge is installed
    bridge.install_workspace(workspaces.clone());

    let monitor = SyncStatusMonitor::new(
        bridge,
        Arc::new(MapStore::default()),
        MonitorConfig::default(),
    );

    monitor.poll_once().await.unwrap();
    assert_eq!(monitor.snapshot().status, SyncStatus::SetupRequired);
    assert_eq!(workspaces.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_late_injection_clears_setup() {
    let bridge = Arc::new(CapabilityBridge::new());
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md", "b.md"]"#);
    let monitor = SyncStatusMonitor::new(bridge.clone(), store, MonitorConfig::default());

    monitor.poll_once().await.unwrap();
    assert_eq!(monitor.snapshot().status, SyncStatus::SetupRequired);

    bridge.install_workspace(Arc::new(FakeWorkspaces {
        folders: folders(&["/wiki/a"]),
        ..Default::default()
    }));
    bridge.install_git(Arc::new(FakeGit::default()));

    monitor.poll_once().await.unwrap();
    let snapshot = monitor.snapshot();
    assert!(!snapshot.needs_setup);
    assert_eq!(snapshot.status, SyncStatus::CommitAndPushPending);
    assert_eq!(snapshot.pending_count, 2);
}

// ============================================================
// on_sync_triggered
// ============================================================

#[tokio::test]
async fn test_sync_is_noop_without_unsynced_work() {
    let workspaces = Arc::new(FakeWorkspaces {
        folders: folders(&["/wiki/a"]),
        ..Default::default()
    });
    let git = Arc::new(FakeGit::default());
    let monitor = monitor_with(
        workspaces.clone(),
        git.clone(),
        Arc::new(MapStore::default()),
        MonitorConfig::default(),
    );

    assert_eq!(monitor.on_sync_triggered().await, SyncOutcome::Skipped);
    assert_eq!(workspaces.calls.load(Ordering::SeqCst), 0);
    assert_eq!(git.list_calls.load(Ordering::SeqCst), 0);
    assert!(git.sync_calls().is_empty());
}

#[tokio::test]
async fn test_sync_commits_only_modified_folders() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);
    store.put("/wiki/c", r#"["c1.md", "c2.md"]"#);

    let git = Arc::new(git_with(&[
        ("/wiki/a", &["a.md"]),
        ("/wiki/b", &[]),
        ("/wiki/c", &["c1.md", "c2.md"]),
    ]));
    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a", "/wiki/b", "/wiki/c"]),
            ..Default::default()
        }),
        git.clone(),
        store,
        MonitorConfig::default(),
    );
    monitor.check_git_state().await.unwrap();

    let outcome = monitor.on_sync_triggered().await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            synced: vec!["/wiki/a".to_string(), "/wiki/c".to_string()],
            failed: vec![],
        }
    );
    assert_eq!(git.list_calls.load(Ordering::SeqCst), 3);
    let mut calls = git.sync_calls();
    calls.sort();
    assert_eq!(calls, vec!["/wiki/a", "/wiki/c"]);
    assert!(!monitor.state().sync_in_progress);
}

#[tokio::test]
async fn test_partial_failure_still_resets_syncing() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let mut git = git_with(&[("/wiki/a", &["a.md"]), ("/wiki/b", &["b.md"])]);
    git.failing.insert("/wiki/b".to_string());
    let git = Arc::new(git);

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a", "/wiki/b"]),
            ..Default::default()
        }),
        git,
        store,
        MonitorConfig::default(),
    );
    monitor.check_git_state().await.unwrap();

    let outcome = monitor.on_sync_triggered().await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            synced: vec!["/wiki/a".to_string()],
            failed: vec!["/wiki/b".to_string()],
        }
    );
    let state = monitor.state();
    assert!(!state.sync_in_progress);
    // Unsynced work is only cleared by the next check
    assert!(state.has_unsynced_commits);
}

#[tokio::test]
async fn test_listing_failure_during_sync_is_swallowed() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let bridge = Arc::new(CapabilityBridge::with_services(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a"]),
            ..Default::default()
        }),
        Arc::new(FakeGit::default()),
    ));
    let monitor = SyncStatusMonitor::new(bridge.clone(), store, MonitorConfig::default());
    monitor.check_git_state().await.unwrap();

    let git = Arc::new(FakeGit::default());
    bridge.install_workspace(Arc::new(FakeWorkspaces {
        fail: true,
        ..Default::default()
    }));
    bridge.install_git(git.clone());

    let outcome = monitor.on_sync_triggered().await;

    assert!(matches!(outcome, SyncOutcome::Failed { .. }));
    assert!(git.sync_calls().is_empty());
    assert!(!monitor.state().sync_in_progress);
}

#[tokio::test]
async fn test_second_trigger_while_syncing_is_noop() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let gate = Arc::new(Notify::new());
    let mut git = git_with(&[("/wiki/a", &["a.md"])]);
    git.gate = Some(gate.clone());
    let git = Arc::new(git);
    let workspaces = Arc::new(FakeWorkspaces {
        folders: folders(&["/wiki/a"]),
        ..Default::default()
    });

    let monitor = monitor_with(
        workspaces.clone(),
        git.clone(),
        store,
        MonitorConfig::default(),
    );
    monitor.check_git_state().await.unwrap();

    let first = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.on_sync_triggered().await })
    };

    // Wait until the first sync is blocked inside commit_and_sync
    while git.sync_calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(monitor.snapshot().status, SyncStatus::Syncing);

    let workspace_calls = workspaces.calls.load(Ordering::SeqCst);
    let list_calls = git.list_calls.load(Ordering::SeqCst);

    assert_eq!(monitor.on_sync_triggered().await, SyncOutcome::Skipped);
    assert_eq!(workspaces.calls.load(Ordering::SeqCst), workspace_calls);
    assert_eq!(git.list_calls.load(Ordering::SeqCst), list_calls);
    assert_eq!(git.sync_calls().len(), 1);

    gate.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));
    assert!(!monitor.state().sync_in_progress);
}

#[tokio::test]
async fn test_hanging_sync_times_out() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let mut git = git_with(&[("/wiki/a", &["a.md"])]);
    git.hang = true;

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a"]),
            ..Default::default()
        }),
        Arc::new(git),
        store,
        MonitorConfig::default().with_sync_timeout(Some(Duration::from_millis(20))),
    );
    monitor.check_git_state().await.unwrap();

    assert_eq!(monitor.on_sync_triggered().await, SyncOutcome::TimedOut);
    assert!(!monitor.state().sync_in_progress);
    assert_eq!(monitor.snapshot().status, SyncStatus::CommitAndPushPending);
}

#[tokio::test]
async fn test_sync_publishes_syncing_then_idle() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let monitor = monitor_with(
        Arc::new(FakeWorkspaces {
            folders: folders(&["/wiki/a"]),
            ..Default::default()
        }),
        Arc::new(git_with(&[("/wiki/a", &["a.md"])])),
        store,
        MonitorConfig::default(),
    );
    let mut updates = monitor.subscribe();

    monitor.check_git_state().await.unwrap();
    assert_eq!(
        updates.recv().await.unwrap().status,
        SyncStatus::CommitAndPushPending
    );

    monitor.on_sync_triggered().await;
    assert_eq!(updates.recv().await.unwrap().status, SyncStatus::Syncing);
    let last = updates.recv().await.unwrap();
    assert!(!last.sync_in_progress);
    assert_eq!(last.status, SyncStatus::CommitAndPushPending);
}

// ============================================================
// Polling loop
// ============================================================

#[tokio::test]
async fn test_polling_loop_picks_up_late_services_and_stops() {
    let bridge = Arc::new(CapabilityBridge::new());
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", r#"["a.md"]"#);

    let monitor = Arc::new(SyncStatusMonitor::new(
        bridge.clone(),
        store,
        MonitorConfig::default().with_poll_interval(Duration::from_millis(10)),
    ));
    let mut updates = monitor.subscribe();
    let handle = monitor.start();
    assert!(handle.is_running());

    let first = updates.recv().await.unwrap();
    assert_eq!(first.status, SyncStatus::SetupRequired);

    let workspaces = Arc::new(FakeWorkspaces {
        folders: folders(&["/wiki/a"]),
        ..Default::default()
    });
    bridge.install_workspace(workspaces.clone());
    bridge.install_git(Arc::new(FakeGit::default()));

    let ready = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = updates.recv().await.unwrap();
            if snapshot.status != SyncStatus::SetupRequired {
                return snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(ready.status, SyncStatus::CommitAndPushPending);

    handle.stop().await;
    let calls = workspaces.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(workspaces.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_dropping_handle_stops_polling() {
    let workspaces = Arc::new(FakeWorkspaces::default());
    let monitor = monitor_with(
        workspaces.clone(),
        Arc::new(FakeGit::default()),
        Arc::new(MapStore::default()),
        MonitorConfig::default().with_poll_interval(Duration::from_millis(5)),
    );

    let handle = monitor.start();
    while workspaces.calls.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(handle);

    // Let the aborted task wind down
    tokio::time::sleep(Duration::from_millis(20)).await;
    let calls = workspaces.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(workspaces.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_failed_cycle_does_not_end_the_loop() {
    let store = Arc::new(MapStore::default());
    store.put("/wiki/a", "garbage");
    let workspaces = Arc::new(FakeWorkspaces {
        folders: folders(&["/wiki/a"]),
        ..Default::default()
    });

    let monitor = monitor_with(
        workspaces.clone(),
        Arc::new(FakeGit::default()),
        store,
        MonitorConfig::default().with_poll_interval(Duration::from_millis(5)),
    );

    let handle = monitor.start();
    tokio::time::timeout(Duration::from_secs(5), async {
        while workspaces.calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(handle.is_running());
    handle.stop().await;
}
