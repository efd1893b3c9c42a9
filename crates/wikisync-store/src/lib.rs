//! # wikisync-store
//!
//! Text key-value stores holding the cached modified-file lists the monitor
//! reads through [`wikisync_core::CachedStateStore`].
//!
//! - [`MemoryStateStore`] - In-process map
//! - [`FileStateStore`] - One file per key in a state directory
//! - [`record_modified_files`] - Write a folder's list in the format the
//!   monitor expects

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use thiserror::Error;
use wikisync_core::{modified_file_list_key, CachedStateStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

/// A state store that can also be written
pub trait WritableStateStore: CachedStateStore {
    fn write_text(&self, key: &str, text: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Cache the modified files of `folder` as a JSON array.
pub fn record_modified_files<S>(store: &S, folder: &str, files: &[String]) -> Result<(), StoreError>
where
    S: WritableStateStore + ?Sized,
{
    let text = serde_json::to_string(files)?;
    store.write_text(&modified_file_list_key(folder), &text)
}
