use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// Cache entry with timestamp
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub stored_at: Instant,
}

/// Time-bounded map from fingerprint to a computed result.
///
/// Expiry is lazy: there is no background sweep, the read that finds an
/// entry older than the TTL removes it. An optional entry cap evicts the
/// oldest-stored entry when a new key would overflow it.
pub struct ResultCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl<V> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(Arc::clone(&entry.value));
        }
        drop(entry);

        // re-checked under the shard write lock so a fresh put is never dropped
        self.entries
            .remove_if(key, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_shared(key, Arc::new(value));
    }

    pub fn put_shared(&self, key: impl Into<String>, value: Arc<V>) {
        let key = key.into();
        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&key) && self.entries.len() >= max {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
