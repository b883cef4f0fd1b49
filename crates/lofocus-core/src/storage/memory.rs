use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{LocalStore, UpdateFn};
use crate::error::StorageError;

/// Process-memory local tier. Clones share the same map.
///
/// `fail_writes` makes every `set` fail, to exercise lost local writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed(format!("write to '{key}' rejected")));
        }
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        let next = apply(entries.get(key).cloned())?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed(format!("write to '{key}' rejected")));
        }
        match &next {
            Some(value) => entries.insert(key.to_string(), value.clone()),
            None => entries.remove(key),
        };
        Ok(next)
    }
}
