//! Review attachments and signed upload slots.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::FileId;

/// A file the user wants to attach to a review, held in memory until upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name, used only for display and logging.
    pub file_name: String,
    /// MIME type sent with the upload (e.g., `image/jpeg`).
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size of the attachment in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the attachment has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Payloads can be megabytes; never dump them into logs.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A one-time upload destination issued by the backend.
///
/// Implements `Debug` manually to redact the upload token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    /// Destination path inside the storage bucket.
    pub path: String,
    /// Single-use token authorizing the upload.
    pub token: String,
}

impl UploadSlot {
    /// Create a new upload slot.
    #[must_use]
    pub fn new(path: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            token: token.into(),
        }
    }

    /// Identifier the review references once the upload has succeeded.
    #[must_use]
    pub fn file_id(&self) -> FileId {
        FileId::new(self.path.clone())
    }
}

impl fmt::Debug for UploadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSlot")
            .field("path", &self.path)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_slot_debug_redacts_token() {
        let slot = UploadSlot::new("reviews/s1/a.jpg", "super_secret_upload_token");
        let debug_output = format!("{slot:?}");

        assert!(debug_output.contains("reviews/s1/a.jpg"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_upload_token"));
    }

    #[test]
    fn test_attachment_debug_omits_bytes() {
        let attachment = Attachment::new("a.jpg", "image/jpeg", vec![0xAB; 4]);
        let debug_output = format!("{attachment:?}");

        assert!(debug_output.contains("len: 4"));
        assert!(!debug_output.contains("171"));
    }

    #[test]
    fn test_file_id_is_slot_path() {
        let slot = UploadSlot::new("reviews/s1/b.png", "t");
        assert_eq!(slot.file_id().as_str(), "reviews/s1/b.png");
    }
}
