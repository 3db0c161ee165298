//! Image intake and object storage.
//!
//! Uploaded photos are sniffed by their magic bytes before anything else
//! looks at them; only JPEG, PNG and GIF are accepted. Accepted images are
//! written through an [`ObjectStorage`] which hands back the public reference
//! stored on the issue.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Default upload ceiling, 5 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("Image is empty")]
    Empty,
    #[error("Image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Only image files are allowed (jpeg, png, gif)")]
    UnsupportedFormat,
}

/// A photo that passed intake checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageUpload {
    pub fn from_bytes(bytes: Vec<u8>, max_bytes: usize) -> Result<Self, ImageRejection> {
        if bytes.is_empty() {
            return Err(ImageRejection::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(ImageRejection::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }
        let format = ImageFormat::sniff(&bytes).ok_or(ImageRejection::UnsupportedFormat)?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// Which photo slot an upload fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePurpose {
    Report,
    Proof,
}

impl ImagePurpose {
    fn folder(self) -> &'static str {
        match self {
            ImagePurpose::Report => "reports",
            ImagePurpose::Proof => "proofs",
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Persist the image and return the reference stored on the issue
    async fn upload(&self, image: &ImageUpload, purpose: ImagePurpose) -> Result<String, StorageError>;

    /// Remove a previously uploaded image by its reference
    async fn delete(&self, reference: &str) -> Result<(), StorageError>;
}

/// Writes images to a directory that is served statically under
/// `public_prefix`.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_name(format: ImageFormat) -> String {
        format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            format.extension()
        )
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, image: &ImageUpload, purpose: ImagePurpose) -> Result<String, StorageError> {
        let dir = self.root.join(purpose.folder());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                path: dir.display().to_string(),
                source,
            })?;

        let name = Self::file_name(image.format());
        let path = dir.join(&name);
        tokio::fs::write(&path, image.bytes())
            .await
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;

        debug!(path = %path.display(), bytes = image.bytes().len(), "Stored image");
        Ok(format!("{}/{}/{}", self.public_prefix, purpose.folder(), name))
    }

    async fn delete(&self, reference: &str) -> Result<(), StorageError> {
        // Only plain paths under the public prefix map back into the root
        let relative = reference
            .strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| {
                !rest
                    .split('/')
                    .any(|part| part.is_empty() || part == "." || part == "..")
            })
            .ok_or_else(|| StorageError::Backend(format!("{reference} is not a stored image")))?;

        let path = self.root.join(relative);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "Removed image");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest byte strings that pass format sniffing
    pub fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    pub fn jpeg_bytes() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }
}
