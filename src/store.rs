use std::collections::HashMap;
use std::sync::RwLock;

/// Errors produced by a [`KvStore`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key cannot be empty")]
    EmptyKey,

    #[error("key not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

/// Capability handed to the service layer.
///
/// Every operation rejects an empty key before touching any state.
pub trait KvStore: Send + Sync {
    /// Insert or overwrite the value for `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Return the current value for `key`
    fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Remove the entry for `key`
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory key-value store
///
/// Reads share the lock, writes take it exclusively. The lock is only held
/// for the single map operation.
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently held
    pub fn len(&self) -> Result<usize, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Internal("lock poisoned".to_string())
}

impl KvStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let data = self.data.read().map_err(poisoned)?;
        data.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let mut data = self.data.write().map_err(poisoned)?;
        match data.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}
