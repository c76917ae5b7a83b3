//! Object storage client for uploaded media.
//!
//! This crate provides:
//! - Byte uploads for avatars, resumes and company logos
//! - Public URL construction for stored objects
//! - Best-effort deletion (cleanup never blocks the primary response)
//! - Connectivity check for readiness probes

pub mod client;
pub mod error;
pub mod keys;

pub use client::{MediaStorage, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use keys::{content_type_extension, MediaKind, StoredObject};
