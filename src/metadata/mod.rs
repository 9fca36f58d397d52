//! Per-photo location and description notes.
//!
//! The store keeps two mappings keyed by [`PhotoRef`]. Each mapping is an
//! immutable value behind an `Arc`: updates build a new mapping and swap it
//! in, so a snapshot handed to the background writer never changes under it.

pub mod writer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collection::{PhotoCollection, PhotoRef};
use crate::storage::{KeyValueStore, StorageError};

pub use writer::PersistQueue;

/// Storage entry holding the description mapping
pub const DESCRIPTIONS_KEY: &str = "photoDescriptions";
/// Storage entry holding the location mapping
pub const LOCATIONS_KEY: &str = "photoLocations";

pub type PhotoMap = BTreeMap<PhotoRef, String>;

/// User-entered notes for one photo. Empty strings when nothing was saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub location: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    descriptions: Arc<PhotoMap>,
    locations: Arc<PhotoMap>,
    /// Set when an entry could not be read at load. The stored data may
    /// still be intact, so it must not be overwritten this session.
    unreadable: bool,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate the store from `backend`.
    ///
    /// Never fails: a missing entry yields an empty mapping, and an
    /// unreadable or malformed entry is logged and replaced by an empty one.
    ///
    /// A malformed entry is lost already and may be overwritten by the next
    /// persist. An entry that could not be read at all (I/O, SQLite, lock)
    /// marks the store unreadable, and [`MetadataStore::persist`] refuses to
    /// write for the rest of the session.
    pub fn load(backend: &dyn KeyValueStore) -> Self {
        let mut unreadable = false;
        let descriptions = load_entry_or_empty(backend, DESCRIPTIONS_KEY, &mut unreadable);
        let locations = load_entry_or_empty(backend, LOCATIONS_KEY, &mut unreadable);
        tracing::debug!(
            backend = backend.name(),
            descriptions = descriptions.len(),
            locations = locations.len(),
            unreadable,
            "Loaded photo metadata"
        );
        Self {
            descriptions: Arc::new(descriptions),
            locations: Arc::new(locations),
            unreadable,
        }
    }

    /// Whether storage failed to read at load, making this store in-memory only
    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    pub fn descriptions(&self) -> &PhotoMap {
        &self.descriptions
    }

    pub fn locations(&self) -> &PhotoMap {
        &self.locations
    }

    /// Notes for `photo`, empty strings when it has none
    pub fn metadata(&self, photo: &PhotoRef) -> PhotoMetadata {
        PhotoMetadata {
            location: self.locations.get(photo).cloned().unwrap_or_default(),
            description: self.descriptions.get(photo).cloned().unwrap_or_default(),
        }
    }

    pub fn set_description(&mut self, photo: &PhotoRef, text: &str) {
        self.descriptions = Arc::new(with_entry(&self.descriptions, photo, text));
    }

    pub fn set_location(&mut self, photo: &PhotoRef, text: &str) {
        self.locations = Arc::new(with_entry(&self.locations, photo, text));
    }

    /// Remove every note for `photo`. Returns whether anything was removed.
    pub fn delete(&mut self, photo: &PhotoRef) -> bool {
        let mut removed = false;
        if self.descriptions.contains_key(photo) {
            self.descriptions = Arc::new(without_entry(&self.descriptions, photo));
            removed = true;
        }
        if self.locations.contains_key(photo) {
            self.locations = Arc::new(without_entry(&self.locations, photo));
            removed = true;
        }
        removed
    }

    /// Drop notes whose photo is not part of `photos`. Returns the number of
    /// photos whose notes were removed.
    pub fn prune(&mut self, photos: &PhotoCollection) -> usize {
        let orphans: Vec<PhotoRef> = self
            .descriptions
            .keys()
            .chain(self.locations.keys())
            .filter(|photo| !photos.contains(photo))
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for photo in &orphans {
            self.delete(photo);
        }
        orphans.len()
    }

    /// Cheap copy of the current mappings for persisting elsewhere
    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            descriptions: Arc::clone(&self.descriptions),
            locations: Arc::clone(&self.locations),
        }
    }

    /// Overwrite both storage entries with the current mappings.
    pub fn persist(&self, backend: &dyn KeyValueStore) -> Result<(), StorageError> {
        if self.unreadable {
            return Err(StorageError::Unreadable);
        }
        self.snapshot().write_to(backend)
    }
}

/// Frozen view of both mappings at one point in time.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    descriptions: Arc<PhotoMap>,
    locations: Arc<PhotoMap>,
}

impl MetadataSnapshot {
    /// Serialized storage entries, descriptions first
    pub fn encode(&self) -> Result<Vec<(&'static str, String)>, StorageError> {
        Ok(vec![
            (DESCRIPTIONS_KEY, encode_entry(DESCRIPTIONS_KEY, &self.descriptions)?),
            (LOCATIONS_KEY, encode_entry(LOCATIONS_KEY, &self.locations)?),
        ])
    }

    pub fn write_to(&self, backend: &dyn KeyValueStore) -> Result<(), StorageError> {
        let entries = self.encode()?;
        backend.set_many(&entries)
    }
}

/// Read and decode a single mapping entry.
pub fn load_entry(backend: &dyn KeyValueStore, key: &str) -> Result<PhotoMap, StorageError> {
    match backend.get(key)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(PhotoMap::new()),
    }
}

fn load_entry_or_empty(backend: &dyn KeyValueStore, key: &str, unreadable: &mut bool) -> PhotoMap {
    match load_entry(backend, key) {
        Ok(map) => map,
        Err(e @ StorageError::Corrupt { .. }) => {
            tracing::error!(key = %key, error = %e, "Discarding malformed photo metadata");
            PhotoMap::new()
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Failed to read photo metadata, saving is disabled");
            *unreadable = true;
            PhotoMap::new()
        }
    }
}

fn encode_entry(key: &str, map: &PhotoMap) -> Result<String, StorageError> {
    serde_json::to_string(map).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}

fn with_entry(map: &PhotoMap, photo: &PhotoRef, text: &str) -> PhotoMap {
    let mut next = map.clone();
    next.insert(photo.clone(), text.to_string());
    next
}

fn without_entry(map: &PhotoMap, photo: &PhotoRef) -> PhotoMap {
    let mut next = map.clone();
    next.remove(photo);
    next
}
