use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::backend::Backend;
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::io::store::ScopeId;
use crate::model::document::StoreDocument;

/// Name of the directory holding a store, relative to its root
pub const STORE_DIR: &str = ".ordo";

/// Name of the backing document inside the store directory
pub const STORE_FILE: &str = "store.json";

/// Error type for store I/O operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not an ordo store: no .ordo/ directory found")]
    NotAStore,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse store document: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("store schema version {found} is newer than this build supports ({supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("unknown scope {0}")]
    UnknownScope(ScopeId),
    #[error("scope {0} cannot be closed")]
    ScopeBusy(ScopeId),
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover a store by walking up from the given directory, looking for a
/// `.ordo/` subdirectory. Returns the root (the parent of `.ordo/`).
pub fn discover_store(start: &Path) -> Result<PathBuf, StoreError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(STORE_DIR).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(StoreError::NotAStore);
        }
    }
}

/// A store persisted as one pretty-printed JSON document on disk.
pub struct FileBackend {
    store_dir: PathBuf,
}

impl FileBackend {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        FileBackend {
            store_dir: store_dir.into(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_dir.join(STORE_FILE)
    }
}

impl Backend for FileBackend {
    fn load(&mut self) -> Result<Option<StoreDocument>, StoreError> {
        let path = self.store_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadError { path, source: e }),
        };
        match serde_json::from_str(&text) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                recovery::log_recovery(
                    &self.store_dir,
                    RecoveryEntry {
                        timestamp: chrono::Utc::now(),
                        category: RecoveryCategory::Parse,
                        description: "unreadable store document".to_string(),
                        fields: vec![
                            ("Source".to_string(), STORE_FILE.to_string()),
                            ("Error".to_string(), e.to_string()),
                        ],
                        body: text,
                    },
                );
                Err(StoreError::ParseError(e))
            }
        }
    }

    fn write(&mut self, doc: &StoreDocument) -> Result<(), StoreError> {
        let path = self.store_path();
        let content = serde_json::to_string_pretty(doc)?;
        if let Err(e) = recovery::atomic_write(&path, content.as_bytes()) {
            recovery::log_recovery(
                &self.store_dir,
                RecoveryEntry {
                    timestamp: chrono::Utc::now(),
                    category: RecoveryCategory::Write,
                    description: "store write failed".to_string(),
                    fields: vec![
                        ("Target".to_string(), STORE_FILE.to_string()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: content,
                },
            );
            return Err(StoreError::WriteError { path, source: e });
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let path = self.store_path();
        if !path.exists() {
            // Nothing has been written yet
            return Ok(());
        }
        recovery::sync_path(&path)
    }

    fn describe(&self) -> String {
        self.store_path().display().to_string()
    }
}
