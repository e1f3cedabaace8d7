// In-memory key-value cache
// DashMap entries with optional expiry, removed lazily on access

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use distlock_common::StoreError;

use crate::cache::KvCache;

struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory cache with set-if-absent and compare-and-delete
#[derive(Clone, Default)]
pub struct MemoryKvCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryKvCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        self.entries.get(key).map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl KvCache for MemoryKvCache {
    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.value == expected)
            .is_some())
    }
}
