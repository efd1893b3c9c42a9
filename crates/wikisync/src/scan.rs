//! Refreshes the cached modified-file lists the monitor reads.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use wikisync_core::FolderDescriptor;
use wikisync_git::GitCli;
use wikisync_store::{record_modified_files, WritableStateStore};

/// Scan result for one folder
#[derive(Debug)]
pub struct FolderScan {
    pub folder: String,
    pub result: Result<usize>,
}

/// Ask git for each folder's modified files and cache the lists.
///
/// Folders are scanned one after another. A failing folder is logged and
/// keeps its previous record.
pub async fn scan_folders(
    git: &GitCli,
    store: &dyn WritableStateStore,
    folders: &[FolderDescriptor],
) -> Vec<FolderScan> {
    let mut scans = Vec::with_capacity(folders.len());

    for folder in folders {
        let result = scan_folder(git, store, &folder.path).await;
        match &result {
            Ok(count) => debug!(folder = %folder.path, count, "Scanned folder"),
            Err(e) => warn!(folder = %folder.path, error = %e, "Failed to scan folder"),
        }
        scans.push(FolderScan {
            folder: folder.path.clone(),
            result,
        });
    }

    scans
}

async fn scan_folder(git: &GitCli, store: &dyn WritableStateStore, folder: &str) -> Result<usize> {
    let status = git
        .status(Path::new(folder))
        .await
        .with_context(|| format!("Failed to read git status of {}", folder))?;

    let files = status.paths();
    record_modified_files(store, folder, &files)
        .with_context(|| format!("Failed to cache modified files of {}", folder))?;

    Ok(files.len())
}
