//! Persisted record types.
//!
//! # Data Model Overview
//!
//! ```text
//! Chat ──owns──▶ Note ──owns──▶ Attachment (metadata only)
//!                                   │
//!                                   └── id ──refers to──▶ blob in `files/`
//! ```
//!
//! Records never carry attachment bytes. The blob store owns those, keyed by
//! [`Attachment::id`].
//!
//! # Backward Compatibility
//!
//! Documents written by the browser build used `Date.now()` numbers as chat
//! and note ids, and an empty string for notes without text. Both are
//! normalized while decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Icon assigned to chats that were stored without one.
pub const DEFAULT_ICON: &str = "💡";

/// A named container of notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Unique chat identifier, immutable after creation.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,

    /// User-visible chat name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// A short glyph shown next to the name.
    #[serde(default = "default_icon")]
    pub icon: String,

    /// When this chat was created.
    pub created_at: DateTime<Utc>,

    /// Notes in insertion (chronological) order.
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Chat {
    /// Ids of every attachment referenced anywhere in this chat.
    pub fn attachment_ids(&self) -> impl Iterator<Item = &str> {
        self.notes
            .iter()
            .flat_map(|note| note.attachments.iter())
            .map(|attachment| attachment.id.as_str())
    }
}

/// A timestamped entry of text and/or attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,

    #[serde(
        default,
        deserialize_with = "text_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Metadata for a binary object attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Blob store key. Unique across the dataset.
    pub id: String,

    /// Original file name.
    pub name: String,

    /// Formatted size, e.g. "1.5 KB".
    pub size: String,

    /// MIME type as reported at upload time.
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

/// Accept an id written either as a JSON string or a JSON number.
pub(crate) fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Treat `""` and `null` as no text.
pub(crate) fn text_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.filter(|t| !t.is_empty()))
}

// ============================================================================
// TESTS
// ============================================================================
