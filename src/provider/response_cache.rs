// src/provider/response_cache.rs
// Short-lived cache of normalized provider responses

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::NormalizedHotelRecord;
use crate::cache::CacheKey;

#[derive(Clone, Debug)]
pub struct CachedResponse {
    pub hotels: Vec<NormalizedHotelRecord>,
    pub timestamp: Instant,
}

pub struct ResponseCache {
    cache: Arc<RwLock<HashMap<CacheKey, CachedResponse>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn is_fresh(&self, cached: &CachedResponse) -> bool {
        cached.timestamp.elapsed() < self.ttl
    }

    /// Get response from cache if present and not expired. A stale entry
    /// is removed on the way out.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<NormalizedHotelRecord>> {
        {
            let cache = self.cache.read().await;
            match cache.get(key) {
                Some(cached) if self.is_fresh(cached) => return Some(cached.hotels.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut cache = self.cache.write().await;
        // re-check: a writer may have refreshed it between the two locks
        if cache.get(key).is_some_and(|cached| !self.is_fresh(cached)) {
            cache.remove(key);
        }
        None
    }

    /// Store a response; expired entries are pruned on every write.
    pub async fn set(&self, key: CacheKey, hotels: Vec<NormalizedHotelRecord>) {
        let mut cache = self.cache.write().await;
        cache.retain(|_, cached| self.is_fresh(cached));
        cache.insert(
            key,
            CachedResponse {
                hotels,
                timestamp: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, cached| self.is_fresh(cached));
        before - cache.len()
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.cache.read().await.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
