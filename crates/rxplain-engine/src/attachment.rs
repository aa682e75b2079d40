//! Image attachment staging.
//!
//! At most one image is staged before a send. Validation happens up front;
//! the preview data URI is rendered afterwards on the blocking pool and is
//! absent until that finishes.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use tracing::debug;

use crate::config::DEFAULT_MAX_ATTACHMENT_BYTES;

/// An image file selected by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// File name sent with the upload.
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Create a file from its parts.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = tokio::fs::read(path).await.map_err(AttachmentError::Io)?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().to_string());
        Ok(Self::new(name, mime_type, bytes))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the MIME type is an image type.
    pub fn is_image(&self) -> bool {
        self.mime_type
            .split('/')
            .next()
            .is_some_and(|top| top.trim().eq_ignore_ascii_case("image"))
    }
}

/// A staged attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The staged file.
    pub file: ImageFile,
    /// Base64 data URI for previews; `None` until rendered.
    pub preview_data_uri: Option<String>,
}

/// Pending preview render for a staged file.
#[derive(Debug, Clone)]
pub struct PreviewJob {
    generation: u64,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl PreviewJob {
    /// Staging generation this job belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Render the data URI without blocking the caller's task.
    pub async fn render(self) -> String {
        let mime_type = self.mime_type.clone();
        let bytes = Arc::clone(&self.bytes);
        tokio::task::spawn_blocking(move || to_data_uri(&mime_type, &bytes))
            .await
            .unwrap_or_else(|_| to_data_uri(&self.mime_type, &self.bytes))
    }
}

/// Encode bytes as a `data:` URI.
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// Holds at most one pending image.
#[derive(Debug, Clone)]
pub struct AttachmentStager {
    staged: Option<Attachment>,
    generation: u64,
    max_bytes: u64,
}

impl AttachmentStager {
    /// Create a stager with the given size limit.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            staged: None,
            generation: 0,
            max_bytes,
        }
    }

    /// Currently staged attachment.
    pub fn staged(&self) -> Option<&Attachment> {
        self.staged.as_ref()
    }

    /// Current staging generation. Changes on every stage or removal.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validate and stage a file, replacing any previous attachment.
    ///
    /// On error nothing changes. On success the returned job renders the
    /// preview; apply it with [`Self::apply_preview`].
    pub fn stage(&mut self, file: ImageFile) -> Result<PreviewJob, AttachmentError> {
        if !file.is_image() {
            return Err(AttachmentError::InvalidType(file.mime_type));
        }
        if file.size() > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size: file.size(),
                max: self.max_bytes,
            });
        }

        self.generation += 1;
        let job = PreviewJob {
            generation: self.generation,
            mime_type: file.mime_type.clone(),
            bytes: Arc::from(file.bytes.as_slice()),
        };
        debug!(name = %file.name, size = file.size(), "Attachment staged");
        self.staged = Some(Attachment {
            file,
            preview_data_uri: None,
        });
        Ok(job)
    }

    /// Store a rendered preview if its staging is still current.
    ///
    /// Returns `false` when the attachment was removed or replaced meanwhile.
    pub fn apply_preview(&mut self, generation: u64, data_uri: String) -> bool {
        match self.staged.as_mut() {
            Some(attachment) if generation == self.generation => {
                attachment.preview_data_uri = Some(data_uri);
                true
            }
            _ => false,
        }
    }

    /// Drop the staged attachment.
    pub fn remove(&mut self) {
        self.staged = None;
        self.generation += 1;
    }

    /// Drop the staged attachment after a confirmed send.
    pub fn clear_after_send(&mut self) {
        self.remove();
    }
}

impl Default for AttachmentStager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_BYTES)
    }
}

/// Errors from staging an attachment.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// The file is not an image.
    #[error("Only image files are supported (got {0})")]
    InvalidType(String),

    /// The file exceeds the size limit.
    #[error("Image is too large ({size} bytes, limit {max} bytes)")]
    TooLarge {
        /// File size in bytes.
        size: u64,
        /// Limit in bytes.
        max: u64,
    },

    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
