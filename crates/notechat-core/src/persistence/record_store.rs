//! Chat records, keyed by chat id.
//!
//! # File Structure
//!
//! The whole `chats` table lives in one document:
//!
//! ```text
//! {data_dir}/chats.json     # { "chats": [ Chat, ... ] }
//! ```
//!
//! Every mutating call rewrites the document through `chats.json.tmp` and an
//! atomic rename, so a call either lands completely or not at all.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;

use super::types::Chat;
use crate::error::{NotechatError, Result};

const TABLE_FILE: &str = "chats.json";

/// A transactional key → chat record store.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Insert or update every chat. Input order wins; untouched records
    /// keep their relative order after the input.
    async fn put_all(&self, chats: &[Chat]) -> Result<()>;

    /// Replace the entire table with `chats`.
    async fn replace_all(&self, chats: &[Chat]) -> Result<()>;

    /// All stored chats in stored order.
    async fn get_all(&self) -> Result<Vec<Chat>>;

    /// Remove one chat. Missing chats are not an error.
    async fn delete(&self, chat_id: &str) -> Result<()>;

    /// Remove every chat.
    async fn clear(&self) -> Result<()>;
}

/// On-disk shape of the `chats` table.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ChatTable {
    #[serde(default)]
    chats: Vec<Chat>,
}

/// Single-document [`RecordStore`].
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    /// Open (creating if needed) the directory holding the table.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| NotechatError::StorageUnavailable {
                path: dir.clone(),
                source,
            })?;
        log::debug!("Opened record store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(TABLE_FILE)
    }

    async fn read_table(&self) -> Result<ChatTable> {
        let contents = match fs::read_to_string(self.table_path()).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ChatTable::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|e| NotechatError::CorruptRecord(e.to_string()))
    }

    async fn write_table(&self, chats: &[Chat]) -> Result<()> {
        #[derive(Serialize)]
        struct ChatTableRef<'a> {
            chats: &'a [Chat],
        }

        let json = serde_json::to_string_pretty(&ChatTableRef { chats })
            .map_err(|e| NotechatError::CorruptRecord(e.to_string()))?;

        let temp_path = self.dir.join(format!("{TABLE_FILE}.tmp"));
        fs::write(&temp_path, json).await?;
        if let Err(e) = fs::rename(&temp_path, self.table_path()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        log::debug!("Wrote {} chat records", chats.len());
        Ok(())
    }
}

impl RecordStore for FsRecordStore {
    async fn put_all(&self, chats: &[Chat]) -> Result<()> {
        let existing = self.read_table().await?.chats;
        let merged = upsert(existing, chats);
        self.write_table(&merged).await
    }

    async fn replace_all(&self, chats: &[Chat]) -> Result<()> {
        self.write_table(chats).await
    }

    async fn get_all(&self) -> Result<Vec<Chat>> {
        Ok(self.read_table().await?.chats)
    }

    async fn delete(&self, chat_id: &str) -> Result<()> {
        let mut table = self.read_table().await?;
        let before = table.chats.len();
        table.chats.retain(|c| c.id != chat_id);

        if table.chats.len() == before {
            return Ok(());
        }
        self.write_table(&table.chats).await
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(self.table_path()).await {
            Ok(()) => {
                log::info!("Cleared record store");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Merge `incoming` over `existing`: incoming records first, in input order,
/// then any existing record whose id wasn't in the input.
fn upsert(existing: Vec<Chat>, incoming: &[Chat]) -> Vec<Chat> {
    let mut merged: Vec<Chat> = Vec::with_capacity(existing.len() + incoming.len());
    for chat in incoming {
        // Last occurrence wins if the input repeats an id.
        merged.retain(|c| c.id != chat.id);
        merged.push(chat.clone());
    }
    for chat in existing {
        if !merged.iter().any(|c| c.id == chat.id) {
            merged.push(chat);
        }
    }
    merged
}

// ============================================================================
// TESTS
// ============================================================================
