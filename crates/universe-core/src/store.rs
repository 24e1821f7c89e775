//! Token storage contract.
//!
//! Each provider adapter owns its own token storage; the reconciliation
//! layer never reads or writes it.

use std::collections::HashMap;
use std::sync::RwLock;

/// Key-value storage for provider tokens.
pub trait TokenStore: Send + Sync {
    /// Stores a token.
    fn set(&self, key: &str, value: &str) -> std::io::Result<()>;

    /// Retrieves a token.
    fn get(&self, key: &str) -> std::io::Result<Option<String>>;

    /// Deletes a token, returning whether it existed.
    fn delete(&self, key: &str) -> std::io::Result<bool>;

    /// Checks whether a key exists.
    fn has(&self, key: &str) -> std::io::Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory token store. The default backing for adapters when no
/// persistent store is injected, and the backing used by tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        Ok(self.entries.read().expect("lock poisoned").get(key).cloned())
    }

    fn delete(&self, key: &str) -> std::io::Result<bool> {
        Ok(self
            .entries
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some())
    }
}
