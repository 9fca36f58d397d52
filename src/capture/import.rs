//! Import of existing image files as a capture source.

use chrono::Utc;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::{CaptureDevice, CaptureError, PermissionStatus};
use crate::collection::PhotoRef;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

// Candidate names tried per capture before giving up
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Capture device that copies existing image files into the photo library.
///
/// Files are queued with [`FileImportDevice::queue`] and each `capture`
/// imports the oldest one. Permission is granted when the library directory
/// exists or can be created.
pub struct FileImportDevice {
    library: PathBuf,
    queued: VecDeque<PathBuf>,
}

impl FileImportDevice {
    pub fn new(library: PathBuf) -> Self {
        Self {
            library,
            queued: VecDeque::new(),
        }
    }

    pub fn queue(&mut self, source: PathBuf) {
        self.queued.push_back(source);
    }

    pub fn pending(&self) -> usize {
        self.queued.len()
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Create a new, empty library file for `source`.
    ///
    /// Names are `{stem}_{timestamp}_{seq}{.ext}`. The file is created
    /// exclusively, so a name taken by an earlier import (from this or any
    /// other process) moves on to the next sequence number instead of
    /// overwriting it.
    fn create_destination(&self, source: &Path) -> io::Result<(PathBuf, File)> {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        for seq in 0..MAX_NAME_ATTEMPTS {
            let path = self.library.join(destination_name(source, &timestamp, seq));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free file name left in the photo library",
        ))
    }
}

fn destination_name(source: &Path, timestamp: &str, seq: u32) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "photo".to_string());
    let extension = source
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    format!("{}_{}_{}{}", stem, timestamp, seq, extension)
}

impl CaptureDevice for FileImportDevice {
    fn request_permission(&mut self) -> PermissionStatus {
        match fs::create_dir_all(&self.library) {
            Ok(()) => PermissionStatus::Granted,
            Err(e) => {
                tracing::warn!(library = ?self.library, error = %e, "Photo library is not writable");
                PermissionStatus::Denied
            }
        }
    }

    fn capture(&mut self) -> Result<PhotoRef, CaptureError> {
        let source = self.queued.pop_front().ok_or(CaptureError::NothingToCapture)?;
        let mut input = File::open(&source).map_err(|e| CaptureError::Io {
            path: source.clone(),
            source: e,
        })?;
        let (destination, mut output) =
            self.create_destination(&source).map_err(|e| CaptureError::Io {
                path: self.library.clone(),
                source: e,
            })?;

        if let Err(e) = io::copy(&mut input, &mut output) {
            drop(output);
            if let Err(cleanup) = fs::remove_file(&destination) {
                tracing::warn!(path = ?destination, error = %cleanup, "Failed to remove partial import");
            }
            return Err(CaptureError::Io {
                path: source,
                source: e,
            });
        }

        let destination = destination.canonicalize().unwrap_or(destination);
        Ok(PhotoRef::from_path(&destination))
    }
}
