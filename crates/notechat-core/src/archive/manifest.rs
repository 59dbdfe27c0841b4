//! The manifest document stored at `notechat_data/data.json`.
//!
//! The same shape doubles as the legacy flat document, where attachments carry
//! their bytes inline as a `data:` URL instead of a `path` into the archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NotechatError, Result};
use crate::persistence::types::{id_from_string_or_number, text_or_none, DEFAULT_ICON};

/// Version tag written into new manifests.
pub const MANIFEST_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub version: String,

    /// Export time, RFC 3339.
    #[serde(default)]
    pub timestamp: String,

    pub chats: Vec<ManifestChat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChat {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<ManifestNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestNote {
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
    pub attachments: Vec<ManifestAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAttachment {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,

    /// Location of the bytes inside the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Legacy inline payload (`data:<mime>;base64,<bytes>`). Read only.
    #[serde(default, skip_serializing)]
    pub data: Option<String>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

impl Manifest {
    /// Parse and validate a manifest document.
    ///
    /// Fails with [`NotechatError::ArchiveFormat`] if the text isn't JSON,
    /// if `chats` is missing or not an array, or if any entry is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| NotechatError::ArchiveFormat(format!("manifest is not valid JSON: {e}")))?;

        match value.get("chats") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(NotechatError::ArchiveFormat(
                    "manifest chat list is not an array".to_string(),
                ))
            }
            None => {
                return Err(NotechatError::ArchiveFormat(
                    "manifest has no chat list".to_string(),
                ))
            }
        }

        serde_json::from_value(value)
            .map_err(|e| NotechatError::ArchiveFormat(format!("malformed manifest: {e}")))
    }
}
