// src/cache/mod.rs
// Two-tier caching layer: process-local LRU (Tier-1) over a shared store (Tier-2)

pub mod coordinator;
pub mod key;
pub mod memory_tier;
pub mod redis_cache;
pub mod shared_memory;
pub mod stats;
pub mod warming;

pub use coordinator::{CacheCoordinator, CacheObserver, TracingObserver, WarmingHandle};
pub use key::{build_key, CacheKey, KeyBuilder, ParamValue, Params};
pub use memory_tier::MemoryTier;
pub use redis_cache::RedisCache;
pub use shared_memory::SharedMemoryCache;
pub use stats::{CacheStatistics, CacheStats};
pub use warming::{WarmingQueue, WarmingTask};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheTier {
    L1, // process-local LRU
    L2, // shared store (Redis)
}

/// A value read from one of the tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Value,
    pub tier: CacheTier,
}

/// Upper bound on a stored entry's lifetime; longer TTLs are clamped.
const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + ttl`, clamped so huge TTLs cannot overflow `Instant`.
pub(crate) fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_ENTRY_LIFETIME))
        .or_else(|| now.checked_add(Duration::from_secs(365 * 24 * 60 * 60)))
        .unwrap_or(now)
}

/// Tier-2 contract. Every error is a `CacheError::TierUnavailable` or a
/// serialization failure; the coordinator treats both as a miss/no-op.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError>;

    /// Multi-key lookup; the result is positionally aligned with `keys`.
    async fn get_many(&self, keys: &[CacheKey]) -> Result<Vec<Option<Value>>, CacheError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Store with an expiry enforced by the store itself.
    async fn set(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Delete every key containing `pattern`; empty pattern deletes all.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}
