//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Fingerprint-deduplicated fragment records
//! - FTS5 keyword index with a substring fallback
//! - Embedded vectors for brute-force similarity candidates
//! - Session analytics and save points

mod migrations;
mod sessions;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sessions::{SavePointRecord, SessionRecord};
pub use sqlite::{Result, Storage, StorageError};
