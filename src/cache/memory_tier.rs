//! Tier-1: process-local, bounded, recency-evicting store
//!
//! Each entry keeps its own expiry, capped by the tier's retention window so
//! Tier-1 never serves a value older than that window.

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use super::expiry_after;
use super::key::CacheKey;

/// Tier-1 entry with timestamps for TTL and recency
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub value: Value,
    pub stored_at: Instant,
    pub last_accessed: Instant,
    pub expires_at: Instant,
}

impl MemoryEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            stored_at: now,
            last_accessed: now,
            expires_at: expiry_after(now, ttl),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct MemoryTier {
    entries: Mutex<LruCache<CacheKey, MemoryEntry>>,
    retention: Duration,
}

impl MemoryTier {
    pub fn new(capacity: usize, retention: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Look up `key`, refreshing its recency. Expired entries are dropped.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = now;
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => return None,
        }
        entries.pop(key);
        None
    }

    /// Store `value`; the effective TTL is `min(ttl, retention)`.
    pub fn insert(&self, key: CacheKey, value: Value, ttl: Duration) {
        let ttl = ttl.min(self.retention);
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), MemoryEntry::new(value, ttl)) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Tier-1 evicted least recently used entry");
            }
        }
    }

    /// Presence check that does not touch recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let entries = self.entries.lock();
        entries
            .peek(key)
            .map(|e| !e.is_expired(Instant::now()))
            .unwrap_or(false)
    }

    pub fn entry(&self, key: &CacheKey) -> Option<MemoryEntry> {
        self.entries.lock().peek(key).cloned()
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Remove every key containing `pattern`; an empty pattern clears the tier.
    pub fn remove_matching(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock();
        if pattern.is_empty() {
            let n = entries.len();
            entries.clear();
            return n;
        }
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.as_str().contains(pattern))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
