//! Attachment bytes, keyed by attachment id.
//!
//! # File Structure
//!
//! ```text
//! {data_dir}/files/
//! ├── <attachment-id>        # raw bytes
//! └── ...
//! ```
//!
//! Writes go to `<attachment-id>.tmp` first and are renamed into place, so a
//! concurrent `get` sees either the old object or the new one, never a
//! partial write.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;

use crate::error::{NotechatError, Result};
use crate::ids::is_valid_id;

/// A transactional key → binary object store.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Store or overwrite the object under `id`.
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the object under `id`, or `None` if there isn't one.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the object under `id`. Missing objects are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every object.
    async fn clear(&self) -> Result<()>;
}

/// Directory-backed [`BlobStore`]: one file per object.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) the blob directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| NotechatError::StorageUnavailable {
                path: dir.clone(),
                source,
            })?;
        log::debug!("Opened blob store at {}", dir.display());
        Ok(Self { dir })
    }

    fn object_path(&self, id: &str) -> Option<PathBuf> {
        is_valid_id(id).then(|| self.dir.join(id))
    }
}

impl BlobStore for FsBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self
            .object_path(id)
            .ok_or_else(|| NotechatError::InvalidBlobId(id.to_string()))?;
        let temp_path = self.dir.join(format!("{id}.tmp"));

        fs::write(&temp_path, bytes).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        log::debug!("Stored blob {id} ({} bytes)", bytes.len());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.object_path(id) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(path) = self.object_path(id) else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("Deleted blob {id}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        log::info!("Cleared blob store ({removed} objects)");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
