//! Persistence - the single entry point for callers.
//!
//! ```text
//!            caller (CLI, UI, ...)
//!                     │  &mut Dataset
//!                     ▼
//!            ┌──────────────────┐
//!            │   Persistence    │──── export/import ───▶ archive
//!            └────────┬─────────┘
//!             ┌───────┴────────┐
//!             ▼                ▼
//!       RecordStore        BlobStore
//!        (chats)            (files)
//! ```
//!
//! Store calls within one operation are issued one after another, never
//! concurrently. Bytes always land in the blob store before any record that
//! refers to them, and records are removed before the blobs they refer to,
//! so an interrupted operation leaves at worst orphaned blobs.

use std::collections::HashSet;

use chrono::Utc;

use crate::archive::{self, ExportOutcome};
use crate::config::StoreConfig;
use crate::dataset::Dataset;
use crate::error::{IntegrityWarning, NotechatError, Result};
use crate::format::format_size;
use crate::ids::new_id;
use crate::persistence::{
    migrate_legacy_if_needed, Attachment, BlobStore, Chat, FsBlobStore, FsRecordStore, Note,
    RecordStore,
};

/// An attachment supplied by the caller when appending a note.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Summary of a completed import.
#[derive(Debug)]
pub struct ImportReport {
    pub chats: usize,
    pub attachments: usize,
    pub warnings: Vec<IntegrityWarning>,
}

/// Coordinates the record and blob stores on behalf of callers.
pub struct Persistence<R = FsRecordStore, B = FsBlobStore> {
    records: R,
    blobs: B,
}

impl Persistence<FsRecordStore, FsBlobStore> {
    /// Open the on-disk stores described by `config`.
    ///
    /// A legacy flat document found in the data directory is migrated once.
    /// If that migration fails the legacy file is kept and opening proceeds.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let records = FsRecordStore::open(config.data_dir()).await?;
        let blobs = FsBlobStore::open(config.files_dir()).await?;

        if let Err(e) = migrate_legacy_if_needed(&config.legacy_path(), &records, &blobs).await {
            log::error!(
                "Legacy migration of {} failed: {e}",
                config.legacy_path().display()
            );
        }

        log::info!("Opened data store at {}", config.data_dir().display());
        Ok(Self::new(records, blobs))
    }
}

impl<R: RecordStore, B: BlobStore> Persistence<R, B> {
    pub fn new(records: R, blobs: B) -> Self {
        Self { records, blobs }
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Load every stored chat.
    pub async fn load_all(&self) -> Result<Dataset> {
        let chats = self.records.get_all().await?;
        log::debug!("Loaded {} chats", chats.len());
        Ok(Dataset::from_chats(chats))
    }

    /// Persist `dataset` as the complete set of chats.
    ///
    /// Blobs referenced only by chats or attachments that are no longer in
    /// the dataset are deleted afterwards, best effort.
    pub async fn save_all(&self, dataset: &Dataset) -> Result<()> {
        let previous = self.stored_attachment_ids().await?;
        self.records.replace_all(dataset.chats()).await?;

        let live: HashSet<&str> = dataset.chats().iter().flat_map(Chat::attachment_ids).collect();
        let orphaned: Vec<String> = previous
            .into_iter()
            .filter(|id| !live.contains(id.as_str()))
            .collect();
        self.delete_blobs_best_effort(&orphaned).await;

        Ok(())
    }

    /// Store `bytes` under a fresh attachment id and return the id.
    pub async fn append_attachment_blob(&self, bytes: &[u8]) -> Result<String> {
        let id = new_id();
        self.blobs.put(&id, bytes).await?;
        Ok(id)
    }

    /// Fetch the bytes stored for an attachment.
    pub async fn fetch_attachment_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.blobs.get(id).await
    }

    /// Append a note with optional text and attachments to a chat.
    ///
    /// Attachment bytes are stored first, then the whole chat list is
    /// rewritten in dataset order. `dataset` is only updated once both have
    /// succeeded.
    pub async fn append_note(
        &self,
        dataset: &mut Dataset,
        chat_id: &str,
        text: Option<String>,
        attachments: Vec<NewAttachment>,
    ) -> Result<Note> {
        let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        if text.is_none() && attachments.is_empty() {
            return Err(NotechatError::EmptyNote);
        }

        let mut chats = dataset.chats().to_vec();
        let chat = chats
            .iter_mut()
            .find(|chat| chat.id == chat_id)
            .ok_or_else(|| NotechatError::ChatNotFound(chat_id.to_string()))?;

        let mut stored: Vec<Attachment> = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            match self.append_attachment_blob(&attachment.bytes).await {
                Ok(id) => stored.push(Attachment {
                    id,
                    name: attachment.name,
                    size: format_size(attachment.bytes.len() as u64),
                    mime_type: attachment.mime_type,
                }),
                Err(e) => {
                    self.delete_blobs_best_effort(&ids_of(&stored)).await;
                    return Err(e);
                }
            }
        }

        let note = Note {
            id: new_id(),
            text,
            timestamp: Utc::now(),
            attachments: stored,
        };
        chat.notes.push(note.clone());

        if let Err(e) = self.records.replace_all(&chats).await {
            self.delete_blobs_best_effort(&ids_of(&note.attachments)).await;
            return Err(e);
        }

        dataset.push_note(chat_id, note.clone())?;
        log::debug!(
            "Appended note {} to chat {chat_id} ({} attachments)",
            note.id,
            note.attachments.len()
        );
        Ok(note)
    }

    /// Delete a chat together with every attachment blob it owns.
    ///
    /// The record goes first, then the blobs. Both phases are always
    /// attempted. The chat leaves `dataset` once its record is gone, even if
    /// some blobs could not be removed.
    pub async fn delete_chat(&self, dataset: &mut Dataset, chat_id: &str) -> Result<()> {
        let chat = dataset
            .find_chat(chat_id)
            .ok_or_else(|| NotechatError::ChatNotFound(chat_id.to_string()))?;
        let blob_ids: Vec<String> = chat.attachment_ids().map(str::to_string).collect();

        let record_failure = match self.records.delete(chat_id).await {
            Ok(()) => {
                dataset.remove_chat(chat_id);
                None
            }
            Err(e) => {
                log::error!("Failed to delete chat record {chat_id}: {e}");
                Some(e.to_string())
            }
        };

        let mut blob_failure = None;
        for id in &blob_ids {
            if let Err(e) = self.blobs.delete(id).await {
                log::warn!("Failed to delete blob {id} of chat {chat_id}: {e}");
                blob_failure.get_or_insert_with(|| e.to_string());
            }
        }

        if blob_failure.is_none() && record_failure.is_none() {
            log::info!("Deleted chat {chat_id} ({} attachments)", blob_ids.len());
            return Ok(());
        }

        Err(NotechatError::DeleteIncomplete {
            chat_id: chat_id.to_string(),
            blobs: blob_failure,
            records: record_failure,
        })
    }

    /// Build an archive of `dataset` and every blob it references.
    pub async fn export_archive(&self, dataset: &Dataset) -> Result<ExportOutcome> {
        archive::export(dataset.chats(), &self.blobs, Utc::now()).await
    }

    /// Replace the stored and in-memory dataset with the contents of an archive.
    ///
    /// Nothing is touched if the archive is malformed. On success the blobs of
    /// the previous dataset are deleted, best effort.
    pub async fn import_archive(&self, dataset: &mut Dataset, bytes: &[u8]) -> Result<ImportReport> {
        let replaced = self.stored_attachment_ids().await?;
        let staged = archive::import(bytes, &self.blobs).await?;

        if let Err(e) = self.records.replace_all(&staged.chats).await {
            archive::discard_staged(&self.blobs, &staged.staged_blobs).await;
            return Err(e);
        }

        self.delete_blobs_best_effort(&replaced).await;

        let report = ImportReport {
            chats: staged.chats.len(),
            attachments: staged.staged_blobs.len(),
            warnings: staged.warnings,
        };
        dataset.replace(staged.chats);

        log::info!(
            "Imported {} chats, {} attachments ({} skipped)",
            report.chats,
            report.attachments,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Clear both stores and the in-memory dataset.
    ///
    /// Both stores are always cleared, even if the first one fails. On any
    /// failure `dataset` is left as is and the caller should reload.
    pub async fn reset_all(&self, dataset: &mut Dataset) -> Result<()> {
        let blobs = self.blobs.clear().await.err().map(|e| e.to_string());
        let records = self.records.clear().await.err().map(|e| e.to_string());

        if blobs.is_some() || records.is_some() {
            log::error!("Reset incomplete (blobs: {blobs:?}, records: {records:?})");
            return Err(NotechatError::ResetIncomplete { blobs, records });
        }

        dataset.clear();
        log::info!("Reset all data");
        Ok(())
    }

    /// Attachment ids referenced by the stored table. An unreadable table
    /// yields none, so operations that overwrite it can still go ahead.
    async fn stored_attachment_ids(&self) -> Result<Vec<String>> {
        match self.records.get_all().await {
            Ok(chats) => Ok(chats
                .iter()
                .flat_map(Chat::attachment_ids)
                .map(str::to_string)
                .collect()),
            Err(NotechatError::CorruptRecord(reason)) => {
                log::warn!("Stored chats unreadable, their blobs won't be cleaned up: {reason}");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_blobs_best_effort(&self, ids: &[String]) {
        for id in ids {
            if let Err(e) = self.blobs.delete(id).await {
                log::warn!("Failed to delete blob {id}: {e}");
            }
        }
    }
}

fn ids_of(attachments: &[Attachment]) -> Vec<String> {
    attachments.iter().map(|a| a.id.clone()).collect()
}

// ============================================================================
// TESTS
// ============================================================================
