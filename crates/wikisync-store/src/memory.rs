use std::collections::HashMap;
use std::sync::RwLock;

use wikisync_core::CachedStateStore;

use crate::{StoreError, WritableStateStore};

/// State held in memory, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachedStateStore for MemoryStateStore {
    fn read_text(&self, key: &str) -> Option<String> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

impl WritableStateStore for MemoryStateStore {
    fn write_text(&self, key: &str, text: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
