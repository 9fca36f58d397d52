//! Photo capture and gallery notes.
//!
//! Photos are captured into a [`PhotoCollection`], and the gallery attaches
//! a location and a description to each one. Notes live in a
//! [`MetadataStore`] persisted to a key-value backend.

pub mod capture;
pub mod collection;
pub mod config;
pub mod gallery;
pub mod logging;
pub mod metadata;
pub mod storage;

pub use collection::{PhotoCollection, PhotoRef};
pub use gallery::{GalleryController, GalleryError, GalleryState};
pub use metadata::{MetadataStore, PhotoMetadata};
