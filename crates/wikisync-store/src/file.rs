use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::warn;

use wikisync_core::CachedStateStore;

use crate::{StoreError, WritableStateStore};

/// State kept as one file per key.
///
/// Keys contain folder paths, so each file is named by the SHA-256 of its
/// key rather than the key itself.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Use `<data_dir>/wikisync/state`, creating it if needed
    pub fn open_default() -> Result<Self, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Self::open(data_dir.join("wikisync").join("state"))
    }

    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

impl CachedStateStore for FileStateStore {
    fn read_text(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state record");
                None
            }
        }
    }
}

impl WritableStateStore for FileStateStore {
    fn write_text(&self, key: &str, text: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        // Write then rename so readers never see a partial record
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
