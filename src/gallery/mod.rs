//! Gallery workflow over a photo collection and its metadata store.
//!
//! The controller is either idle or editing one photo. Saving and deleting
//! write through to the [`MetadataStore`] and queue a full persist, unless
//! storage could not be read at load, in which case changes stay in memory.

pub mod edit;

use std::sync::Arc;
use thiserror::Error;

use crate::collection::{PhotoCollection, PhotoRef};
use crate::metadata::{MetadataStore, PersistQueue, PhotoMetadata};
use crate::storage::KeyValueStore;

pub use edit::{EditField, EditSession, TextField};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("photo {0} is not in the gallery")]
    UnknownPhoto(PhotoRef),

    #[error("no photo is being edited")]
    NotEditing,

    #[error("photo {0} is being edited")]
    EditInProgress(PhotoRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GalleryState {
    #[default]
    Idle,
    Editing(EditSession),
}

/// One grid cell: a photo and its notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryTile {
    pub photo: PhotoRef,
    pub metadata: PhotoMetadata,
}

pub struct GalleryController {
    photos: PhotoCollection,
    store: MetadataStore,
    writer: PersistQueue,
    state: GalleryState,
}

impl GalleryController {
    pub fn new(photos: PhotoCollection, store: MetadataStore, writer: PersistQueue) -> Self {
        if store.is_unreadable() {
            tracing::warn!("Photo notes could not be read, changes will not be saved this session");
        }
        Self {
            photos,
            store,
            writer,
            state: GalleryState::Idle,
        }
    }

    /// Hydrate metadata from `backend` and start its writer.
    /// Must be called from within a tokio runtime.
    pub fn open(photos: PhotoCollection, backend: Arc<dyn KeyValueStore>) -> Self {
        let store = MetadataStore::load(backend.as_ref());
        let writer = PersistQueue::spawn(backend);
        tracing::info!(photos = photos.len(), "Opened gallery");
        Self::new(photos, store, writer)
    }

    pub fn photos(&self) -> &PhotoCollection {
        &self.photos
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn writer(&self) -> &PersistQueue {
        &self.writer
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, GalleryState::Editing(_))
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        match &self.state {
            GalleryState::Editing(session) => Some(session),
            GalleryState::Idle => None,
        }
    }

    pub fn edit_session_mut(&mut self) -> Option<&mut EditSession> {
        match &mut self.state {
            GalleryState::Editing(session) => Some(session),
            GalleryState::Idle => None,
        }
    }

    /// Whether changes are written to storage
    pub fn is_persistent(&self) -> bool {
        !self.store.is_unreadable()
    }

    pub fn current_metadata(&self, photo: &PhotoRef) -> PhotoMetadata {
        self.store.metadata(photo)
    }

    /// Every photo in collection order with its notes
    pub fn tiles(&self) -> Vec<GalleryTile> {
        self.photos
            .iter()
            .map(|photo| GalleryTile {
                photo: photo.clone(),
                metadata: self.store.metadata(photo),
            })
            .collect()
    }

    /// Open the edit surface for `photo`, pre-filled with its current notes.
    /// An edit already in progress is discarded.
    pub fn select_photo(&mut self, photo: &PhotoRef) -> Result<&mut EditSession, GalleryError> {
        if !self.photos.contains(photo) {
            return Err(GalleryError::UnknownPhoto(photo.clone()));
        }
        if let GalleryState::Editing(previous) = &self.state {
            tracing::debug!(photo = %previous.photo(), "Discarding unsaved edit");
        }

        let session = EditSession::new(photo.clone(), &self.store.metadata(photo));
        self.state = GalleryState::Editing(session);
        self.edit_session_mut().ok_or(GalleryError::NotEditing)
    }

    /// Store `location` and `description` for the selected photo and return
    /// to idle.
    pub fn save(&mut self, location: &str, description: &str) -> Result<PhotoRef, GalleryError> {
        let session = match std::mem::take(&mut self.state) {
            GalleryState::Editing(session) => session,
            GalleryState::Idle => return Err(GalleryError::NotEditing),
        };
        let photo = session.photo().clone();

        self.store.set_description(&photo, description);
        self.store.set_location(&photo, location);
        tracing::info!(photo = %photo, "Saved photo notes");
        self.persist();

        Ok(photo)
    }

    /// Save whatever the edit session currently holds.
    pub fn commit(&mut self) -> Result<PhotoRef, GalleryError> {
        let values = self
            .edit_session()
            .map(EditSession::values)
            .ok_or(GalleryError::NotEditing)?;
        self.save(&values.location, &values.description)
    }

    /// Close the edit surface without saving. Returns whether an edit was open.
    pub fn cancel(&mut self) -> bool {
        matches!(std::mem::take(&mut self.state), GalleryState::Editing(_))
    }

    /// Clear the notes of `photo`. The photo itself stays in the gallery.
    /// Returns whether any notes existed.
    pub fn delete_photo(&mut self, photo: &PhotoRef) -> Result<bool, GalleryError> {
        if let GalleryState::Editing(session) = &self.state {
            return Err(GalleryError::EditInProgress(session.photo().clone()));
        }

        let removed = self.store.delete(photo);
        tracing::info!(photo = %photo, removed, "Deleted photo notes");
        self.persist();
        Ok(removed)
    }

    /// Drop notes for photos that are no longer in the collection.
    pub fn prune(&mut self) -> usize {
        let removed = self.store.prune(&self.photos);
        if removed > 0 {
            tracing::info!(removed, "Pruned notes for missing photos");
            self.persist();
        }
        removed
    }

    /// Wait for queued writes to finish
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn persist(&mut self) {
        if self.store.is_unreadable() {
            tracing::debug!("Storage unreadable at load, keeping change in memory");
            return;
        }
        let generation = self.writer.submit(self.store.snapshot());
        tracing::trace!(generation, "Queued metadata persist");
    }
}
