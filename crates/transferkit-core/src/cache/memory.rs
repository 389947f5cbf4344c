//! Process-local TTL cache
//!
//! Expiry runs on the tokio clock so paused-time tests can drive it. Every
//! write drops entries that have already expired.

use super::FastCache;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
struct Slot {
    value: String,
    deadline: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// In-memory fast cache. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value for a key
    pub fn get(&self, key: &str) -> Option<String> {
        let slots = self.slots.read().ok()?;
        slots
            .get(key)
            .filter(|slot| slot.is_live(Instant::now()))
            .map(|slot| slot.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: String, ttl: Duration) {
        let now = Instant::now();
        let slot = Slot {
            value,
            deadline: now + ttl,
        };
        if let Ok(mut slots) = self.slots.write() {
            slots.retain(|_, slot| slot.is_live(now));
            slots.insert(key.into(), slot);
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut slots) = self.slots.write() {
            slots.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.write() {
            slots.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let Ok(slots) = self.slots.read() else {
            return CacheStats::default();
        };
        let now = Instant::now();
        let live = slots.values().filter(|slot| slot.is_live(now)).count();
        CacheStats {
            live_entries: live,
            expired_entries: slots.len() - live,
        }
    }
}

#[async_trait]
impl FastCache for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(MemoryCache::get(self, key))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        MemoryCache::set(self, key, value, ttl);
        Ok(())
    }
}

/// Entry counts; expired entries linger until the next write
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub live_entries: usize,
    pub expired_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_on_the_tokio_clock() {
        let cache = MemoryCache::new();
        cache.set("short", "a".to_string(), Duration::from_secs(1));
        cache.set("long", "b".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("short"), Some("a".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("short"), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                live_entries: 1,
                expired_entries: 1
            }
        );

        cache.set("other", "c".to_string(), Duration::from_secs(60));
        assert_eq!(
            cache.stats(),
            CacheStats {
                live_entries: 2,
                expired_entries: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_do_not_accumulate_expired_keys() {
        let cache = MemoryCache::new();
        for level in 0..50 {
            cache.set(format!("tk:c1:k1:{}:pt:USER:v1", level), "r".to_string(), Duration::ZERO);
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        assert_eq!(cache.stats().live_entries + cache.stats().expired_entries, 1);

        cache.invalidate("tk:c1:k1:49:pt:USER:v1");
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();

        cache
            .set_raw("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(other.get_raw("k").await.unwrap(), Some("v".to_string()));

        other.clear();
        assert_eq!(cache.get("k"), None);
    }
}
