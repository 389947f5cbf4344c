//! Fast cache layer
//!
//! Advisory key-value storage with TTL. Nothing read from here is
//! authoritative; every miss can be resolved from the metadata store or by
//! extracting again.

mod key;
mod memory;

pub use key::{build_cache_key, llm_cache_key, CacheKeyParts, LLM_KEY_SUFFIX};
pub use memory::{CacheStats, MemoryCache};

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Low-latency key-value store with per-entry TTL
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Raw value for a key, `None` on miss or expiry
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw value with TTL
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

impl<'a> dyn FastCache + 'a {
    /// Typed read; undecodable entries count as misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, "Discarding undecodable cache entry: {}", e);
                Ok(None)
            }
        }
    }

    /// Typed write
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw, ttl).await
    }
}
