//! Local persistence for chats and attachment bytes.
//!
//! # Overview
//!
//! Two logical tables, each behind its own trait:
//!
//! - **Records** ([`RecordStore`]) - chats with nested note and attachment
//!   metadata, keyed by chat id
//! - **Blobs** ([`BlobStore`]) - raw attachment bytes, keyed by attachment id
//!
//! # File Locations
//!
//! ```text
//! {data_dir}/
//! ├── chats.json                   # `chats` table
//! ├── files/
//! │   └── <attachment-id>          # `files` table
//! └── notechat_data.json           # legacy flat document (migrated on open)
//! ```
//!
//! # Design Principles
//!
//! ## Atomic Writes
//!
//! Every write goes to `<file>.tmp` and is renamed into place, so each call
//! is atomic on its own. There is no transaction spanning both tables; the
//! facade orders its calls so a failure leaves at worst orphaned blobs.

pub mod blob_store;
pub mod legacy;
pub mod record_store;
pub mod types;

pub use blob_store::{BlobStore, FsBlobStore};
pub use legacy::{migrate_legacy_if_needed, LEGACY_FILE};
pub use record_store::{FsRecordStore, RecordStore};
pub use types::*;
