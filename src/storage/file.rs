//! Directory backend: one JSON file per key.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StorageError};

pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `directory`, creating it if needed.
    pub fn open(directory: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(directory).map_err(|source| StorageError::Setup {
            path: directory.to_path_buf(),
            source,
        })?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> io::Result<PathBuf> {
        // Keys become file names, so keep them to a safe alphabet
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {:?}", key),
            ));
        }
        Ok(self.directory.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_err = |source| StorageError::Read {
            key: key.to_string(),
            source,
        };
        let path = self.entry_path(key).map_err(read_err)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(read_err(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };
        let path = self.entry_path(key).map_err(write_err)?;
        fs::write(&path, value).map_err(write_err)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
