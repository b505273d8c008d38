//! File attachments for questions
//!
//! Checked before anything touches the transcript or the network.

use crate::message::AttachmentMeta;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Largest accepted attachment, in bytes
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

pub const PDF_TYPE: &str = "application/pdf";
pub const DOCX_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const ALLOWED_TYPES: [&str; 2] = [PDF_TYPE, DOCX_TYPE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type. Please upload PDF or DOCX files only.")]
    InvalidType(String),
    #[error("File size exceeds 5MB limit.")]
    TooLarge(usize),
    #[error("Could not read file: {0}")]
    Unreadable(String),
}

/// Check type and size of a prospective attachment.
pub fn validate(media_type: &str, size: usize) -> Result<(), ValidationError> {
    if !ALLOWED_TYPES.contains(&media_type) {
        return Err(ValidationError::InvalidType(media_type.to_string()));
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(ValidationError::TooLarge(size));
    }
    Ok(())
}

/// A validated attachment with its payload
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    media_type: String,
    data: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let media_type = media_type.into();
        validate(&media_type, data.len())?;
        Ok(Self {
            name: name.into(),
            media_type,
            data,
        })
    }

    /// Read a file, inferring its type from the extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");

        // Type is knowable without reading the file
        if !ALLOWED_TYPES.contains(&media_type) {
            return Err(ValidationError::InvalidType(media_type.to_string()));
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::Unreadable(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());

        Self::new(name, media_type, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Descriptor kept in history after the payload is sent
    pub fn meta(&self) -> AttachmentMeta {
        AttachmentMeta {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
        }
    }
}
