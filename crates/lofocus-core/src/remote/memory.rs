use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Document, DocumentPath, MergeWrite, RemoteStore};
use crate::error::RemoteError;

/// In-process document store. Clones share state.
///
/// `set_offline(true)` makes every call fail with [`RemoteError::Offline`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    docs: Arc<Mutex<HashMap<DocumentPath, Document>>>,
    offline: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Successful merge writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn document(&self, path: &DocumentPath) -> Option<Document> {
        self.docs.lock().ok()?.get(path).cloned()
    }

    pub fn insert_document(&self, path: DocumentPath, doc: Document) {
        if let Ok(mut docs) = self.docs.lock() {
            docs.insert(path, doc);
        }
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, RemoteError> {
        self.check_online()?;
        let docs = self.docs.lock().map_err(|_| RemoteError::Offline)?;
        Ok(docs.get(path).cloned())
    }

    async fn merge_write(&self, path: &DocumentPath, write: &MergeWrite) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut docs = self.docs.lock().map_err(|_| RemoteError::Offline)?;
        write.apply_to(docs.entry(path.clone()).or_default());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
