//! In-process implementation of the Tier-2 contract.
//!
//! Used when no Redis is configured and in tests. It enforces TTLs like the
//! real store and can be switched offline to simulate a network outage.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::key::CacheKey;
use super::{expiry_after, SharedCache};
use crate::error::CacheError;

#[derive(Default)]
pub struct SharedMemoryCache {
    entries: Mutex<HashMap<CacheKey, (Value, Instant)>>,
    offline: AtomicBool,
}

impl SharedMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with `TierUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CacheError::TierUnavailable("shared memory cache offline".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .get(key)
            .map(|(_, expires_at)| *expires_at > Instant::now())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SharedCache for SharedMemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        self.check_online()?;
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                return Ok(Some(value.clone()))
            }
            Some(_) => {}
            None => return Ok(None),
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        self.check_online()?;
        self.entries
            .lock()
            .insert(key.clone(), (value.clone(), expiry_after(Instant::now(), ttl)));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.check_online()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        self.check_online()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.as_str().contains(pattern));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check_online()
    }

    fn name(&self) -> &'static str {
        "shared-memory"
    }
}
