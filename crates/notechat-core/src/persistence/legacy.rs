//! One-shot migration of the legacy flat document.
//!
//! Older builds kept everything in a single `notechat_data.json`
//! (`{version, timestamp, chats}`) with attachment bytes inlined as `data:`
//! URLs. On open, that document is staged through the archive importer
//! (which already understands the format), merged into the `chats` table,
//! and renamed to `notechat_data.json.migrated` so it runs only once. A
//! document whose chats are all already in the table is only renamed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::blob_store::BlobStore;
use super::record_store::RecordStore;
use crate::archive::{self, Manifest};
use crate::error::Result;

/// File name of the legacy flat document.
pub const LEGACY_FILE: &str = "notechat_data.json";

fn migrated_path(legacy_path: &Path) -> PathBuf {
    legacy_path.with_extension("json.migrated")
}

/// Migrate `legacy_path` into the two-table layout if it exists.
///
/// Returns `Ok(true)` if a migration happened, `Ok(false)` if there was
/// nothing to migrate. On failure the legacy file is left in place.
pub async fn migrate_legacy_if_needed<R, B>(legacy_path: &Path, records: &R, blobs: &B) -> Result<bool>
where
    R: RecordStore,
    B: BlobStore,
{
    let bytes = match fs::read(legacy_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if already_migrated(&bytes, records).await? {
        log::warn!(
            "Legacy document {} was already migrated, retiring it",
            legacy_path.display()
        );
        retire(legacy_path).await;
        return Ok(false);
    }

    log::info!("Migrating legacy document {}", legacy_path.display());

    let staged = archive::import(&bytes, blobs).await?;
    if let Err(e) = records.put_all(&staged.chats).await {
        archive::discard_staged(blobs, &staged.staged_blobs).await;
        return Err(e);
    }

    retire(legacy_path).await;

    log::info!(
        "Migrated {} chats from legacy document ({} attachments skipped)",
        staged.chats.len(),
        staged.warnings.len()
    );
    Ok(true)
}

/// True if every chat in the legacy document is already in the table.
///
/// Unparseable documents return false and fail later in the importer.
async fn already_migrated<R: RecordStore>(bytes: &[u8], records: &R) -> Result<bool> {
    let Some(manifest) = std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| Manifest::parse(text).ok())
    else {
        return Ok(false);
    };
    if manifest.chats.is_empty() {
        return Ok(false);
    }

    let stored: HashSet<String> = records.get_all().await?.into_iter().map(|c| c.id).collect();
    Ok(manifest.chats.iter().all(|chat| stored.contains(&chat.id)))
}

/// Rename the legacy document out of the way. A failure is logged only; the
/// next open recognizes the chats as migrated and retries.
async fn retire(legacy_path: &Path) {
    if let Err(e) = fs::rename(legacy_path, migrated_path(legacy_path)).await {
        log::error!(
            "Failed to rename legacy document {}: {e}",
            legacy_path.display()
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
