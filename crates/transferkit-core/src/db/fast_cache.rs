//! SQLite-backed fast cache
//!
//! Lets the CLI keep cache state across invocations. Expiry is stored as
//! unix milliseconds and checked on read.

use super::Database;
use crate::cache::FastCache;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::time::Duration;

impl Database {
    /// Unexpired cached value for a key
    pub fn cache_get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp_millis();
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM fast_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store a value with TTL, replacing any previous entry
    pub fn cache_set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        self.conn()?.execute(
            "INSERT OR REPLACE INTO fast_cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Delete expired entries, returning how many were removed
    pub fn purge_expired_cache(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let removed = self
            .conn()?
            .execute("DELETE FROM fast_cache WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }
}

#[async_trait]
impl FastCache for Database {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.cache_get(key)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.cache_set(key, &value, ttl)
    }
}
