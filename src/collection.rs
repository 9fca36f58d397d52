//! Photo references and the ordered collection handed from capture to the gallery.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const FILE_SCHEME: &str = "file://";

/// Opaque identifier of a captured image, used as the metadata key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(String);

impl PhotoRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Reference for an image file on disk
    pub fn from_path(path: &Path) -> Self {
        Self(format!("{}{}", FILE_SCHEME, path.display()))
    }

    /// The file behind this reference, when it is a `file://` URI
    pub fn to_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PhotoRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PhotoRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PhotoRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered photo references, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoCollection {
    photos: Vec<PhotoRef>,
}

impl PhotoCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a collection from the image files under `directory`.
    ///
    /// Files are sorted by path. Imported file names start with their
    /// original stem and carry a capture timestamp. Paths are canonicalized
    /// so references match the ones produced at import time.
    pub fn from_directory(directory: &Path, extensions: &[String]) -> Result<Self> {
        let mut images = Vec::new();

        if !directory.exists() {
            return Ok(Self::new());
        }
        let directory = directory.canonicalize()?;

        for entry in WalkDir::new(&directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    images.push(path.to_path_buf());
                }
            }
        }

        images.sort();

        Ok(Self {
            photos: images.iter().map(|p| PhotoRef::from_path(p)).collect(),
        })
    }

    pub(crate) fn push(&mut self, photo: PhotoRef) {
        self.photos.push(photo);
    }

    pub fn contains(&self, photo: &PhotoRef) -> bool {
        self.photos.contains(photo)
    }

    pub fn get(&self, index: usize) -> Option<&PhotoRef> {
        self.photos.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhotoRef> {
        self.photos.iter()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

impl FromIterator<PhotoRef> for PhotoCollection {
    fn from_iter<I: IntoIterator<Item = PhotoRef>>(iter: I) -> Self {
        Self {
            photos: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PhotoCollection {
    type Item = &'a PhotoRef;
    type IntoIter = std::slice::Iter<'a, PhotoRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.photos.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_from_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();

        File::create(dir.path().join("b.jpg")).unwrap();
        File::create(dir.path().join("a.PNG")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.jpeg")).unwrap();

        let extensions = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
        let photos = PhotoCollection::from_directory(dir.path(), &extensions).unwrap();

        assert_eq!(photos.len(), 3);
        assert_eq!(
            photos.get(0).and_then(|p| p.to_path()),
            Some(root.join("a.PNG"))
        );
        assert!(photos.contains(&PhotoRef::from_path(&root.join("sub/c.jpeg"))));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let photos =
            PhotoCollection::from_directory(&dir.path().join("nope"), &["jpg".to_string()]).unwrap();
        assert!(photos.is_empty());
    }

    #[test]
    fn test_photo_ref_serializes_as_plain_string() {
        let photo = PhotoRef::new("file:///tmp/a.jpg");
        assert_eq!(serde_json::to_string(&photo).unwrap(), r#""file:///tmp/a.jpg""#);
        assert_eq!(photo.to_path(), Some(PathBuf::from("/tmp/a.jpg")));
        assert_eq!(PhotoRef::new("content://x").to_path(), None);
    }
}
