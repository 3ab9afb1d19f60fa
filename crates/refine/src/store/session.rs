//! In-memory session store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{StoreDriver, StoreKind};
use crate::error::StoreResult;

/// Transient driver holding payloads for the lifetime of a session.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStore {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry of the session.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the session holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StoreDriver for SessionStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Transient
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, payload: String) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), payload);
        Ok(())
    }

    fn forget(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
