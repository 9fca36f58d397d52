//! Key-value backing for persisted photo metadata.
//!
//! Every backend stores opaque string values under string keys. The
//! metadata layer decides what goes into those values (JSON objects), the
//! backends only move bytes around.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackendType, StorageConfig};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read entry `{key}`: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write entry `{key}`: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("entry `{key}` does not hold a valid photo mapping: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode entry `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to prepare storage location {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored notes could not be read at startup, refusing to overwrite them")]
    Unreadable,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Trait for key-value backends.
///
/// Calls are blocking. The persist queue moves them off the async runtime
/// with `spawn_blocking`.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` when the entry was never written
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Write several entries.
    ///
    /// The default writes them one by one and stops at the first failure,
    /// so earlier entries may already be updated. Backends that can do
    /// better override it.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Short backend name for log lines
    fn name(&self) -> &'static str;
}

/// Open the backend selected in the configuration.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackendType::Sqlite => Arc::new(SqliteStore::open(&config.sqlite_path)?),
        StorageBackendType::File => Arc::new(FileStore::open(&config.directory)?),
        StorageBackendType::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = store.name(), "Opened metadata storage");
    Ok(store)
}
