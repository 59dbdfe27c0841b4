//! Store configuration.
//!
//! The data directory is resolved in this order:
//!
//! 1. An explicit path (e.g. the CLI's `--data-dir`)
//! 2. The `NOTECHAT_DATA_DIR` environment variable
//! 3. `$HOME/.notechat`

use std::env;
use std::path::{Path, PathBuf};

use crate::paths::default_data_dir;
use crate::persistence::LEGACY_FILE;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NOTECHAT_DATA_DIR";

const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    data_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory from `explicit`, the environment, or home.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, String> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }

        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(Self::new(dir));
            }
        }

        default_data_dir().map(Self::new)
    }

    /// Directory holding the `chats` table.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the `files` table.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join(FILES_DIR)
    }

    /// Location of the legacy flat document, if one was ever written.
    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_FILE)
    }
}
