//! Archive export and import.
//!
//! # Archive Layout
//!
//! ```text
//! notechat_backup_YYYY-MM-DD.zip
//! └── notechat_data/
//!     ├── data.json                              # Manifest
//!     └── files/
//!         └── chat_<chat-id>/
//!             └── <attachment-id>_<filename>     # Attachment bytes
//! ```
//!
//! # Bounded Degradation
//!
//! An attachment whose bytes can't be found (missing blob on export, missing
//! entry on import) is dropped from its note and reported as an
//! [`IntegrityWarning`]. The rest of the dataset still goes through.
//!
//! # Formats Accepted on Import
//!
//! Input that starts with a zip signature is read as an archive. Anything
//! else is read as the legacy flat JSON document, whose attachments embed
//! their bytes as `data:` URLs.

pub mod manifest;

use std::io::{Cursor, Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{IntegrityWarning, NotechatError, Result};
use crate::format::backup_file_name;
use crate::ids::new_id;
use crate::persistence::blob_store::BlobStore;
use crate::persistence::types::{Attachment, Chat, Note};

pub use manifest::{Manifest, ManifestAttachment, ManifestChat, ManifestNote, MANIFEST_VERSION};

/// Root folder inside the archive.
pub const ARCHIVE_ROOT: &str = "notechat_data";

/// Path of the manifest inside the archive.
pub const MANIFEST_PATH: &str = "notechat_data/data.json";

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Result of [`export`].
#[derive(Debug)]
pub struct ExportOutcome {
    /// Suggested file name, `notechat_backup_YYYY-MM-DD.zip`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Number of attachments written into the archive.
    pub attachments: usize,
    pub warnings: Vec<IntegrityWarning>,
}

/// Result of [`import`]: the staged dataset, not yet persisted.
#[derive(Debug)]
pub struct ImportOutcome {
    pub chats: Vec<Chat>,
    /// Ids of every blob written while staging.
    pub staged_blobs: Vec<String>,
    pub warnings: Vec<IntegrityWarning>,
}

/// Archive path for one attachment.
pub fn attachment_path(chat_id: &str, attachment_id: &str, file_name: &str) -> String {
    format!(
        "{ARCHIVE_ROOT}/files/chat_{}/{}_{}",
        sanitize_component(chat_id),
        attachment_id,
        sanitize_component(file_name)
    )
}

fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn zip_error(e: ZipError) -> NotechatError {
    NotechatError::StorageIo(std::io::Error::new(std::io::ErrorKind::Other, e))
}

// ============================================================================
// Export
// ============================================================================

/// Serialize `chats` and every blob they reference into a zip archive.
///
/// Blobs are fetched one at a time. A missing blob drops that attachment from
/// the manifest; a store error aborts the export.
pub async fn export<B: BlobStore>(
    chats: &[Chat],
    blobs: &B,
    now: DateTime<Utc>,
) -> Result<ExportOutcome> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut warnings = Vec::new();
    let mut written = 0usize;
    let mut manifest_chats = Vec::with_capacity(chats.len());

    for chat in chats {
        let mut notes = Vec::with_capacity(chat.notes.len());

        for note in &chat.notes {
            let mut attachments = Vec::with_capacity(note.attachments.len());

            for attachment in &note.attachments {
                let Some(bytes) = blobs.get(&attachment.id).await? else {
                    let warning = IntegrityWarning {
                        chat_id: chat.id.clone(),
                        note_id: note.id.clone(),
                        attachment: attachment.name.clone(),
                        reason: format!("blob {} missing from store", attachment.id),
                    };
                    log::warn!("Export: {warning}");
                    warnings.push(warning);
                    continue;
                };

                let path = attachment_path(&chat.id, &attachment.id, &attachment.name);
                zip.start_file(path.clone(), options).map_err(zip_error)?;
                zip.write_all(&bytes)?;
                written += 1;

                attachments.push(ManifestAttachment {
                    name: attachment.name.clone(),
                    size: attachment.size.clone(),
                    mime_type: attachment.mime_type.clone(),
                    path: Some(path),
                    data: None,
                });
            }

            notes.push(ManifestNote {
                id: note.id.clone(),
                text: note.text.clone(),
                timestamp: note.timestamp,
                attachments,
            });
        }

        manifest_chats.push(ManifestChat {
            id: chat.id.clone(),
            name: chat.name.clone(),
            description: chat.description.clone(),
            icon: chat.icon.clone(),
            created_at: chat.created_at,
            notes,
        });
    }

    let manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        chats: manifest_chats,
    };
    let json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| NotechatError::ArchiveFormat(format!("cannot encode manifest: {e}")))?;

    zip.start_file(MANIFEST_PATH, options).map_err(zip_error)?;
    zip.write_all(&json)?;
    let bytes = zip.finish().map_err(zip_error)?.into_inner();

    log::info!(
        "Exported {} chats, {} attachments ({} skipped, {} bytes)",
        chats.len(),
        written,
        warnings.len(),
        bytes.len()
    );

    Ok(ExportOutcome {
        file_name: backup_file_name(now),
        bytes,
        attachments: written,
        warnings,
    })
}

// ============================================================================
// Import
// ============================================================================

/// Where attachment bytes come from during import.
enum Payload<'a> {
    Zip(ZipArchive<Cursor<&'a [u8]>>),
    Legacy,
}

impl Payload<'_> {
    /// Bytes for one attachment, or the reason they can't be found.
    fn resolve(&mut self, attachment: &ManifestAttachment) -> std::result::Result<Vec<u8>, String> {
        if let (Payload::Zip(zip), Some(path)) = (&mut *self, attachment.path.as_deref()) {
            return read_entry(zip, path);
        }
        match attachment.data.as_deref() {
            Some(data_url) => decode_data_url(data_url),
            None => Err("no archive entry or inline data recorded".to_string()),
        }
    }
}

fn read_entry(zip: &mut ZipArchive<Cursor<&[u8]>>, path: &str) -> std::result::Result<Vec<u8>, String> {
    let mut entry = match zip.by_name(path) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(format!("entry {path} missing from archive")),
        Err(e) => return Err(format!("entry {path} unreadable: {e}")),
    };

    // The declared size comes from the archive and is not trusted for allocation.
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| format!("entry {path} unreadable: {e}"))?;
    Ok(bytes)
}

/// Decode `data:<mime>;base64,<payload>`.
fn decode_data_url(data_url: &str) -> std::result::Result<Vec<u8>, String> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| "inline data is not a data URL".to_string())?;

    if !header.ends_with(";base64") {
        return Err("inline data is not base64 encoded".to_string());
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("inline data is not valid base64: {e}"))
}

/// Read the manifest out of `bytes`, detecting zip vs legacy JSON.
fn open_payload(bytes: &[u8]) -> Result<(Manifest, Payload<'_>)> {
    if !bytes.starts_with(ZIP_SIGNATURE) {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| NotechatError::ArchiveFormat("not a zip archive or JSON document".to_string()))?;
        log::info!("Import: reading legacy flat document");
        return Ok((Manifest::parse(text)?, Payload::Legacy));
    }

    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| NotechatError::ArchiveFormat(format!("unreadable zip archive: {e}")))?;

    let text = {
        let mut entry = zip.by_name(MANIFEST_PATH).map_err(|e| match e {
            ZipError::FileNotFound => {
                NotechatError::ArchiveFormat(format!("archive has no {MANIFEST_PATH}"))
            }
            other => NotechatError::ArchiveFormat(format!("unreadable manifest: {other}")),
        })?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| NotechatError::ArchiveFormat(format!("unreadable manifest: {e}")))?;
        text
    };

    Ok((Manifest::parse(&text)?, Payload::Zip(zip)))
}

/// Stage an archive (or legacy document) into a fresh dataset.
///
/// The manifest is fully validated before anything is written, so a format
/// error leaves `blobs` untouched. Every attachment that resolves gets a new
/// id and its bytes are stored under it before the next one is read. Notes
/// left with neither text nor attachments are dropped.
pub async fn import<B: BlobStore>(bytes: &[u8], blobs: &B) -> Result<ImportOutcome> {
    let (manifest, mut payload) = open_payload(bytes)?;

    let mut chats = Vec::with_capacity(manifest.chats.len());
    let mut staged_blobs = Vec::new();
    let mut warnings = Vec::new();

    for manifest_chat in manifest.chats {
        let mut notes = Vec::with_capacity(manifest_chat.notes.len());

        for manifest_note in manifest_chat.notes {
            let mut attachments = Vec::with_capacity(manifest_note.attachments.len());

            for manifest_attachment in &manifest_note.attachments {
                let bytes = match payload.resolve(manifest_attachment) {
                    Ok(bytes) => bytes,
                    Err(reason) => {
                        let warning = IntegrityWarning {
                            chat_id: manifest_chat.id.clone(),
                            note_id: manifest_note.id.clone(),
                            attachment: manifest_attachment.name.clone(),
                            reason,
                        };
                        log::warn!("Import: {warning}");
                        warnings.push(warning);
                        continue;
                    }
                };

                let id = new_id();
                if let Err(e) = blobs.put(&id, &bytes).await {
                    discard_staged(blobs, &staged_blobs).await;
                    return Err(e);
                }
                staged_blobs.push(id.clone());

                attachments.push(Attachment {
                    id,
                    name: manifest_attachment.name.clone(),
                    size: manifest_attachment.size.clone(),
                    mime_type: manifest_attachment.mime_type.clone(),
                });
            }

            if manifest_note.text.is_none() && attachments.is_empty() {
                log::warn!(
                    "Import: dropping note {} in chat {} with no remaining content",
                    manifest_note.id,
                    manifest_chat.id
                );
                continue;
            }

            notes.push(Note {
                id: manifest_note.id,
                text: manifest_note.text,
                timestamp: manifest_note.timestamp,
                attachments,
            });
        }

        chats.push(Chat {
            id: manifest_chat.id,
            name: manifest_chat.name,
            description: manifest_chat.description,
            icon: manifest_chat.icon,
            created_at: manifest_chat.created_at,
            notes,
        });
    }

    log::info!(
        "Staged {} chats, {} attachments ({} skipped)",
        chats.len(),
        staged_blobs.len(),
        warnings.len()
    );

    Ok(ImportOutcome {
        chats,
        staged_blobs,
        warnings,
    })
}

/// Best-effort removal of blobs written by an import that didn't complete.
pub(crate) async fn discard_staged<B: BlobStore>(blobs: &B, ids: &[String]) {
    for id in ids {
        if let Err(e) = blobs.delete(id).await {
            log::warn!("Failed to discard staged blob {id}: {e}");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::blob_store::FsBlobStore;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn make_attachment(id: &str, name: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            name: name.to_string(),
            size: "5 Bytes".to_string(),
            mime_type: "text/plain".to_string(),
        }
    }

    fn make_chat(id: &str, attachments: Vec<Attachment>) -> Chat {
        Chat {
            id: id.to_string(),
            name: "Work".to_string(),
            description: "stuff".to_string(),
            icon: "💡".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            notes: vec![Note {
                id: "n1".to_string(),
                text: Some("hello".to_string()),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap(),
                attachments,
            }],
        }
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    #[test]
    fn attachment_path_layout() {
        assert_eq!(
            attachment_path("c1", "a1", "report.pdf"),
            "notechat_data/files/chat_c1/a1_report.pdf"
        );
        assert_eq!(
            attachment_path("c1", "a1", "../x/y.txt"),
            "notechat_data/files/chat_c1/a1_.._x_y.txt"
        );
    }

    #[test]
    fn decode_data_url_accepts_base64() {
        assert_eq!(
            decode_data_url("data:text/plain;base64,aGVsbG8=").unwrap(),
            b"hello".to_vec()
        );
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("garbage").is_err());
    }

    #[tokio::test]
    async fn export_writes_manifest_and_entries() {
        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        blobs.put("a1", b"hello").await.unwrap();

        let chats = vec![make_chat("c1", vec![make_attachment("a1", "note.txt")])];
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        let outcome = export(&chats, &blobs, now).await.unwrap();

        assert_eq!(outcome.file_name, "notechat_backup_2024-05-06.zip");
        assert_eq!(outcome.attachments, 1);
        assert!(outcome.warnings.is_empty());

        let names = entry_names(&outcome.bytes);
        assert!(names.contains(&MANIFEST_PATH.to_string()));
        assert!(names.contains(&"notechat_data/files/chat_c1/a1_note.txt".to_string()));

        let mut zip = ZipArchive::new(Cursor::new(outcome.bytes.as_slice())).unwrap();
        let mut text = String::new();
        zip.by_name(MANIFEST_PATH)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        let manifest = Manifest::parse(&text).unwrap();
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.timestamp, "2024-05-06T12:00:00.000Z");
        assert_eq!(
            manifest.chats[0].notes[0].attachments[0].path.as_deref(),
            Some("notechat_data/files/chat_c1/a1_note.txt")
        );
    }

    #[tokio::test]
    async fn export_skips_missing_blobs() {
        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        blobs.put("present", b"hello").await.unwrap();

        let chats = vec![make_chat(
            "c1",
            vec![
                make_attachment("present", "a.txt"),
                make_attachment("gone", "b.txt"),
            ],
        )];
        let outcome = export(&chats, &blobs, Utc::now()).await.unwrap();

        assert_eq!(outcome.attachments, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].attachment, "b.txt");
        assert_eq!(entry_names(&outcome.bytes).len(), 2);
    }

    #[tokio::test]
    async fn import_assigns_new_ids() {
        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        blobs.put("a1", b"hello").await.unwrap();

        let chats = vec![make_chat("c1", vec![make_attachment("a1", "note.txt")])];
        let exported = export(&chats, &blobs, Utc::now()).await.unwrap();

        let target_dir = tempdir().unwrap();
        let target = FsBlobStore::open(target_dir.path()).await.unwrap();
        let outcome = import(&exported.bytes, &target).await.unwrap();

        let attachment = &outcome.chats[0].notes[0].attachments[0];
        assert_ne!(attachment.id, "a1");
        assert_eq!(outcome.staged_blobs, vec![attachment.id.clone()]);
        assert_eq!(
            target.get(&attachment.id).await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(outcome.chats[0].name, "Work");
        assert_eq!(outcome.chats[0].notes[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn import_rejects_archive_without_manifest() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"x").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        let result = import(&bytes, &blobs).await;

        assert!(matches!(result, Err(NotechatError::ArchiveFormat(_))));
    }

    #[tokio::test]
    async fn import_rejects_garbage() {
        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();

        let result = import(&[0xff, 0xfe, 0x00], &blobs).await;
        assert!(matches!(result, Err(NotechatError::ArchiveFormat(_))));
    }

    #[tokio::test]
    async fn import_legacy_document_decodes_inline_data() {
        let json = r#"{
            "version": "1.0",
            "timestamp": "2024-01-01T00:00:00.000Z",
            "chats": [{
                "id": 1, "name": "Old", "description": "", "icon": "📝",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "notes": [{
                    "id": 2, "text": "", "timestamp": "2024-01-01T00:00:01.000Z",
                    "attachments": [{
                        "name": "a.txt", "size": "5 Bytes", "type": "text/plain",
                        "data": "data:text/plain;base64,aGVsbG8="
                    }]
                }]
            }]
        }"#;

        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        let outcome = import(json.as_bytes(), &blobs).await.unwrap();

        let attachment = &outcome.chats[0].notes[0].attachments[0];
        assert_eq!(outcome.chats[0].id, "1");
        assert_eq!(
            blobs.get(&attachment.id).await.unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn import_survives_entry_with_inflated_size_header() {
        let path = attachment_path("c1", "a1", "big.bin");
        let manifest = format!(
            r#"{{"version": "2.0", "timestamp": "", "chats": [{{
                "id": "c1", "name": "Work", "createdAt": "2024-01-01T00:00:00Z",
                "notes": [{{"id": "n1", "timestamp": "2024-01-01T00:00:00Z",
                    "attachments": [{{"name": "big.bin", "size": "5 Bytes", "type": "", "path": "{path}"}}]}}]
            }}]}}"#
        );

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(path.clone(), options).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.start_file(MANIFEST_PATH, options).unwrap();
        zip.write_all(manifest.as_bytes()).unwrap();
        let mut bytes = zip.finish().unwrap().into_inner();

        // Claim ~4 GiB uncompressed in both the local and central headers of the first entry.
        let declared = 0xFFFF_FFF0u32.to_le_bytes();
        bytes[22..26].copy_from_slice(&declared);
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&declared);

        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();

        match import(&bytes, &blobs).await {
            Ok(outcome) => {
                assert_eq!(outcome.chats.len(), 1);
                assert_eq!(outcome.staged_blobs.len() + outcome.warnings.len(), 1);
                for id in &outcome.staged_blobs {
                    assert_eq!(blobs.get(id).await.unwrap(), Some(b"hello".to_vec()));
                }
            }
            Err(e) => assert!(matches!(e, NotechatError::ArchiveFormat(_)), "{e}"),
        }
    }

    #[tokio::test]
    async fn import_drops_notes_left_empty() {
        let json = r#"{
            "chats": [{
                "id": "c", "name": "n", "createdAt": "2024-01-01T00:00:00Z",
                "notes": [
                    {"id": "keep", "text": "hi", "timestamp": "2024-01-01T00:00:00Z"},
                    {"id": "drop", "timestamp": "2024-01-01T00:00:00Z",
                     "attachments": [{"name": "x.bin", "size": "1 Bytes", "type": ""}]}
                ]
            }]
        }"#;

        let dir = tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).await.unwrap();
        let outcome = import(json.as_bytes(), &blobs).await.unwrap();

        let notes = &outcome.chats[0].notes;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "keep");
        assert_eq!(outcome.warnings.len(), 1);
    }
}
