use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::store_io::StoreError;
use crate::model::document::StoreDocument;

/// The persistent storage a [`Store`](crate::io::store::Store) commits to.
///
/// Implementations persist whole documents; the store decides what goes in
/// them. `sync` is the low-level durability flush used after interactive
/// commits.
pub trait Backend: Send {
    /// Read the persisted document, `None` if nothing was ever written
    fn load(&mut self) -> Result<Option<StoreDocument>, StoreError>;
    /// Persist `doc` as one logical unit
    fn write(&mut self, doc: &StoreDocument) -> Result<(), StoreError>;
    /// Force previously written data to stable storage
    fn sync(&mut self) -> io::Result<()>;
    /// Where the data lives, for diagnostics
    fn describe(&self) -> String;
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Serialized document, so every load is a fresh copy
    content: Option<String>,
    fail_writes: bool,
    fail_syncs: bool,
    writes: usize,
    syncs: usize,
}

/// In-process backend with failure injection.
///
/// Clones share state, so a test can keep one handle while the store owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-write
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Make subsequent syncs fail (or succeed again)
    pub fn fail_syncs(&self, fail: bool) {
        self.state().fail_syncs = fail;
    }

    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn syncs(&self) -> usize {
        self.state().syncs
    }

    /// Replace the persisted document directly, bypassing any store
    pub fn seed(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        self.state().content = Some(serde_json::to_string(doc)?);
        Ok(())
    }

    /// A fresh copy of whatever was last persisted
    pub fn persisted(&self) -> Result<Option<StoreDocument>, StoreError> {
        match &self.state().content {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }
}

impl Backend for MemoryBackend {
    fn load(&mut self) -> Result<Option<StoreDocument>, StoreError> {
        self.persisted()
    }

    fn write(&mut self, doc: &StoreDocument) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        state.content = Some(serde_json::to_string(doc)?);
        state.writes += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_syncs {
            return Err(io::Error::other("injected sync failure"));
        }
        state.syncs += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
