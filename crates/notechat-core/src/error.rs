//! Error types shared by the stores, the archive codec and the facade.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotechatError {
    /// The backing directory could not be created or opened.
    #[error("Storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read or write failed on an open store.
    #[error("Storage I/O error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// A stored table exists but cannot be decoded.
    #[error("Corrupt record table: {0}")]
    CorruptRecord(String),

    /// The archive manifest is missing, unparsable, or has no chat list.
    #[error("Invalid archive format: {0}")]
    ArchiveFormat(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Chat name must not be empty")]
    EmptyChatName,

    #[error("A note needs text, attachments, or both")]
    EmptyNote,

    #[error("Invalid blob id: {0:?}")]
    InvalidBlobId(String),

    /// At least one phase of a reset failed; the caller must reload.
    #[error("Reset incomplete (blobs: {}, records: {})", phase(.blobs), phase(.records))]
    ResetIncomplete {
        blobs: Option<String>,
        records: Option<String>,
    },

    /// The chat was removed from the record store only partially.
    #[error("Delete of chat {chat_id} incomplete (blobs: {}, records: {})", phase(.blobs), phase(.records))]
    DeleteIncomplete {
        chat_id: String,
        blobs: Option<String>,
        records: Option<String>,
    },
}

fn phase(failure: &Option<String>) -> &str {
    failure.as_deref().unwrap_or("ok")
}

pub type Result<T> = std::result::Result<T, NotechatError>;

/// An attachment whose bytes could not be located.
///
/// Never fatal: export and import skip the attachment and keep going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub chat_id: String,
    pub note_id: String,
    pub attachment: String,
    pub reason: String,
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attachment {:?} of note {} in chat {} skipped: {}",
            self.attachment, self.note_id, self.chat_id, self.reason
        )
    }
}
