//! Capture flow: permission handling and accumulating photo references.
//!
//! A [`CaptureDevice`] is whatever produces images (a camera, a file
//! importer). The [`CaptureSession`] asks it for permission once, refuses to
//! capture without it, and collects every reference in capture order.

pub mod import;

use std::path::PathBuf;
use thiserror::Error;

use crate::collection::{PhotoCollection, PhotoRef};

pub use import::FileImportDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Undetermined,
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture permission was not granted")]
    PermissionDenied,

    #[error("nothing to capture")]
    NothingToCapture,

    #[error("failed to capture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait CaptureDevice {
    /// Ask for access to the device
    fn request_permission(&mut self) -> PermissionStatus;

    /// Take one picture and return its reference
    fn capture(&mut self) -> Result<PhotoRef, CaptureError>;
}

pub struct CaptureSession<D> {
    device: D,
    permission: PermissionStatus,
    photos: PhotoCollection,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            permission: PermissionStatus::Undetermined,
            photos: PhotoCollection::new(),
        }
    }

    /// Start from photos captured earlier.
    pub fn with_photos(device: D, photos: PhotoCollection) -> Self {
        Self {
            device,
            permission: PermissionStatus::Undetermined,
            photos,
        }
    }

    pub fn request_permission(&mut self) -> PermissionStatus {
        self.permission = self.device.request_permission();
        if !self.permission.is_granted() {
            tracing::warn!("Capture permission denied");
        }
        self.permission
    }

    pub fn permission(&self) -> PermissionStatus {
        self.permission
    }

    /// Capture a photo and append it to the collection.
    pub fn take_picture(&mut self) -> Result<PhotoRef, CaptureError> {
        if !self.permission.is_granted() {
            return Err(CaptureError::PermissionDenied);
        }
        let photo = self.device.capture()?;
        tracing::info!(photo = %photo, "Captured photo");
        self.photos.push(photo.clone());
        Ok(photo)
    }

    pub fn photos(&self) -> &PhotoCollection {
        &self.photos
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Copy of the collection for the gallery
    pub fn hand_off(&self) -> PhotoCollection {
        self.photos.clone()
    }
}
