//! Database layer for transferkit
//!
//! Provides SQLite-based storage with:
//! - Authoritative transfer metadata rows
//! - A persistent fast cache with expiry
//! - Content, chunks, glossaries and annotations for extraction

mod content;
mod fast_cache;
mod metadata;
mod schema;

pub use content::{ChunkDocument, ContentDocument, ContentInfo};
pub use schema::Database;
use std::path::PathBuf;

impl Database {
    /// Get the default database path (`TRANSFERKIT_DB` overrides)
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("TRANSFERKIT_DB") {
            return PathBuf::from(path);
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("metadata.sqlite")
    }
}
