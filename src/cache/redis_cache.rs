// src/cache/redis_cache.rs - Tier-2 shared cache backed by Redis

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use super::key::CacheKey;
use super::SharedCache;
use crate::error::CacheError;

/// Keys per `DEL` when invalidating by pattern.
const DELETE_BATCH: usize = 500;

/// Redis-backed Tier-2 cache
#[derive(Clone)]
pub struct RedisCache {
    client: Option<ConnectionManager>,
    enabled: bool,
}

/// Escape Redis glob metacharacters so `pattern` matches literally.
fn glob_escape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn substring_glob(pattern: &str) -> String {
    if pattern.is_empty() {
        "*".to_string()
    } else {
        format!("*{}*", glob_escape(pattern))
    }
}

impl RedisCache {
    /// Connect, returning the connection error to the caller.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!(url = %redis_url, "Redis Tier-2 cache connected");
        Ok(Self {
            client: Some(manager),
            enabled: true,
        })
    }

    /// Connect, degrading to a disabled cache when Redis is unreachable.
    pub async fn new(redis_url: &str) -> Self {
        match Self::connect(redis_url).await {
            Ok(cache) => cache,
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis; Tier-2 disabled");
                Self::disabled()
            }
        }
    }

    /// Disabled cache: every read misses, every write is a no-op
    pub fn disabled() -> Self {
        Self {
            client: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.client.is_some()
    }

    fn conn(&self) -> Option<ConnectionManager> {
        if !self.enabled {
            return None;
        }
        self.client.clone()
    }

    /// Get cache health/ping
    pub async fn health_check(&self) -> Result<String, CacheError> {
        match self.conn() {
            Some(mut conn) => {
                let result: String = redis::cmd("PING").query_async::<String>(&mut conn).await?;
                Ok(result)
            }
            None => Ok("Redis disabled".to_string()),
        }
    }

    /// Get number of keys in Redis
    pub async fn key_count(&self) -> Result<usize, CacheError> {
        match self.conn() {
            Some(mut conn) => {
                let count: usize = redis::cmd("DBSIZE").query_async::<usize>(&mut conn).await?;
                Ok(count)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl SharedCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let Some(mut conn) = self.conn() else {
            return Ok(None);
        };
        let raw: Option<String> = conn.get(key.as_str()).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn get_many(&self, keys: &[CacheKey]) -> Result<Vec<Option<Value>>, CacheError> {
        let Some(mut conn) = self.conn() else {
            return Ok(vec![None; keys.len()]);
        };
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&names)
            .query_async::<Vec<Option<String>>>(&mut conn)
            .await?;

        // A corrupt entry is a miss for that key only
        Ok(raw
            .into_iter()
            .map(|v| v.and_then(|json| serde_json::from_str(&json).ok()))
            .collect())
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let Some(mut conn) = self.conn() else {
            return Ok(());
        };
        let json = serde_json::to_string(value)?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key.as_str(), json, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let Some(mut conn) = self.conn() else {
            return Ok(());
        };
        conn.del::<_, ()>(key.as_str()).await?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let Some(mut conn) = self.conn() else {
            return Ok(0);
        };
        // incremental SCAN, not KEYS
        let mut keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(substring_glob(pattern)).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        // SCAN may yield a key more than once
        keys.sort_unstable();
        keys.dedup();

        let mut removed = 0u64;
        for batch in keys.chunks(DELETE_BATCH) {
            let deleted: u64 = conn.del(batch).await?;
            removed += deleted;
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.health_check().await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
