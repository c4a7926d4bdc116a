//! # In-Process Cache
//!
//! Shared string key/value cache with optional per-entry expiry.
//! Handles are cheap clones over the same store; valves reach it through
//! their capability-checked context.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct CacheSlot {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheSlot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe cache handle
#[derive(Clone, Default)]
pub struct Cache {
    inner: Arc<RwLock<HashMap<String, CacheSlot>>>,
}

impl Cache {
    /// Create a new empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value without expiry
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(
            key.into(),
            CacheSlot {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Store a value that expires after `ttl`
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(
            key.into(),
            CacheSlot {
                value: value.into(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    /// Fetch a value; expired entries read as absent
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(key)
            .filter(|slot| !slot.is_expired(Instant::now()))
            .map(|slot| slot.value.clone())
    }

    /// Remove a key; returns whether it was present
    pub fn remove(&self, key: &str) -> bool {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key).is_some()
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, slot| !slot.is_expired(now));
    }

    /// Number of stored entries, including not-yet-purged expired ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let cache = Cache::new();
        cache.set("greeting", "hello");
        assert_eq!(cache.get("greeting"), Some("hello".to_string()));
        assert!(cache.remove("greeting"));
        assert_eq!(cache.get("greeting"), None);
        assert!(!cache.remove("greeting"));
    }

    #[test]
    fn test_expired_entry_reads_absent() {
        let cache = Cache::new();
        cache.set_with_ttl("flash", "gone", Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("flash"), None);
        assert_eq!(cache.len(), 1);

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_handles_share_store() {
        let cache = Cache::new();
        let other = cache.clone();
        other.set("shared", "yes");
        assert_eq!(cache.get("shared"), Some("yes".to_string()));
    }
}
