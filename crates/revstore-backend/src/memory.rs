use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use revstore_types::{ErrorCode, StorError, StorResult, WaitScope};
use tracing::debug;

use crate::traits::Storage;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Values live behind a `RwLock` and are
/// cloned on read and write; everything is lost when the store is dropped.
pub struct MapStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MapStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MapStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MapStorage {
    fn backend_name(&self) -> &'static str {
        "map"
    }

    async fn exists(&self, _scope: &WaitScope, key: &str) -> StorResult<bool> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.contains_key(key))
    }

    async fn get(&self, _scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        map.get(key)
            .cloned()
            .ok_or_else(|| StorError::new(ErrorCode::KeyNotFound, &[&key]))
    }

    async fn save(&self, _scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), data.to_vec());
        debug!(key, len = data.len(), "map save");
        Ok(())
    }
}

impl std::fmt::Debug for MapStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapStorage")
            .field("key_count", &self.len())
            .finish()
    }
}
