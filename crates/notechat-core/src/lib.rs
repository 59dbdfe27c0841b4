//! # notechat-core
//!
//! Persistence core for Notechat, a note organizer where each "chat" holds an
//! ordered list of text notes and file attachments.
//!
//! This crate is framework-agnostic and can be used by:
//! - The `notechat` CLI
//! - Any UI that wants local storage plus backup/restore
//!
//! ## Key Concepts
//!
//! - **Dataset**: the caller-owned list of chats, edited in memory
//! - **Record store / Blob store**: chat metadata and attachment bytes, stored apart
//! - **Archive**: a zip holding a manifest plus every attachment, for backup and restore
//! - **Persistence**: the facade that keeps the two stores consistent

pub mod archive;
pub mod config;
pub mod dataset;
pub mod error;
pub mod facade;
pub mod format;
pub mod ids;
pub mod paths;
pub mod persistence;

// Re-export commonly used types
pub use config::StoreConfig;
pub use dataset::{ChatEdit, Dataset};
pub use error::{IntegrityWarning, NotechatError, Result};
pub use facade::{ImportReport, NewAttachment, Persistence};
pub use persistence::{Attachment, Chat, Note};
