//! Read-through / write-through coordination across both tiers.
//!
//! Lookup order is Tier-1, Tier-2, then the caller's producer. Tier-2
//! failures are reported to the [`CacheObserver`] and otherwise behave like
//! a miss (reads) or a skipped write; producer errors go back to the caller
//! untouched.
//!
//! Concurrent misses on the same key are not coalesced: two callers racing
//! on a cold key may both run their producer.

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::key::{CacheKey, KeyBuilder, Params};
use super::memory_tier::MemoryTier;
use super::stats::{CacheStatistics, CacheStats};
use super::warming::{WarmProducer, WarmingQueue, WarmingTask};
use super::{CacheEntry, CacheTier, SharedCache};
use crate::config::{CacheConfig, CacheOptions};
use crate::error::{CacheError, ProducerError};
use crate::monitoring::metrics::MetricsRecorder;

/// Receives failures the coordinator absorbs instead of returning.
pub trait CacheObserver: Send + Sync {
    fn tier_error(&self, operation: &'static str, key: &str, error: &CacheError);
    fn warming_failed(&self, key: &CacheKey, error: &ProducerError);
}

/// Default observer: structured `warn!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn tier_error(&self, operation: &'static str, key: &str, error: &CacheError) {
        warn!(operation, key, error = %error, "Cache tier failure absorbed");
    }

    fn warming_failed(&self, key: &CacheKey, error: &ProducerError) {
        warn!(key = %key, error = %error, "Cache warming task dropped");
    }
}

/// Keys removed by one `invalidate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    pub l1_removed: usize,
    /// `None` when the Tier-2 delete failed
    pub l2_removed: Option<u64>,
}

/// Aborts the background warming sweep when stopped or dropped.
pub struct WarmingHandle {
    handle: JoinHandle<()>,
}

impl WarmingHandle {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for WarmingHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct CacheCoordinator {
    l1: MemoryTier,
    l2: Arc<dyn SharedCache>,
    stats: CacheStatistics,
    warming: WarmingQueue,
    keys: KeyBuilder,
    metrics: Arc<MetricsRecorder>,
    observer: Arc<dyn CacheObserver>,
    config: CacheConfig,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, CacheError> {
    Ok(serde_json::from_value(value)?)
}

impl CacheCoordinator {
    pub fn new(config: CacheConfig, l2: Arc<dyn SharedCache>, metrics: Arc<MetricsRecorder>) -> Self {
        info!(
            l1_capacity = config.l1_capacity,
            l1_ttl_secs = config.l1_ttl.as_secs(),
            tier2 = l2.name(),
            "Cache coordinator initialized"
        );
        Self {
            l1: MemoryTier::new(config.l1_capacity, config.l1_ttl),
            l2,
            stats: CacheStatistics::new(),
            warming: WarmingQueue::new(),
            keys: KeyBuilder::new(config.key_version),
            metrics,
            observer: Arc::new(TracingObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Key for `(namespace, params)` under this coordinator's schema version.
    pub fn key(&self, namespace: &str, params: &Params) -> CacheKey {
        self.keys.build(namespace, params)
    }

    pub fn memory_tier(&self) -> &MemoryTier {
        &self.l1
    }

    pub fn shared_tier(&self) -> &Arc<dyn SharedCache> {
        &self.l2
    }

    fn absorb(&self, operation: &'static str, key: &str, error: &CacheError) {
        if matches!(error, CacheError::TierUnavailable(_)) {
            self.stats.record_l2_error();
        }
        self.metrics.cache().record_error();
        self.observer.tier_error(operation, key, error);
    }

    /// Read `key` through both tiers, calling `producer` on a full miss.
    pub async fn get<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        producer: F,
        options: CacheOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let started = Instant::now();
        self.metrics.cache().record_request();

        if let Some(value) = self.l1.get(key) {
            match decode::<T>(value) {
                Ok(hit) => {
                    self.stats.record_l1_hit();
                    self.metrics.cache().observe_response_time(started.elapsed());
                    return Ok(hit);
                }
                Err(e) => {
                    self.l1.remove(key);
                    self.absorb("l1_decode", key.as_str(), &e);
                }
            }
        }
        self.stats.record_l1_miss();

        match self.l2.get(key).await {
            Ok(Some(value)) => match decode::<T>(value.clone()) {
                Ok(hit) => {
                    self.stats.record_l2_hit();
                    self.l1.insert(key.clone(), value, options.ttl());
                    debug!(key = %key, "Promoted Tier-2 hit into Tier-1");
                    self.metrics.cache().observe_response_time(started.elapsed());
                    return Ok(hit);
                }
                Err(e) => {
                    self.stats.record_l2_miss();
                    self.absorb("l2_decode", key.as_str(), &e);
                }
            },
            Ok(None) => self.stats.record_l2_miss(),
            Err(e) => {
                self.stats.record_l2_miss();
                self.absorb("get", key.as_str(), &e);
            }
        }

        debug!(key = %key, "Cache miss on both tiers; calling producer");
        let producer = Arc::new(producer);
        let value = match (producer)().await {
            Ok(value) => value,
            Err(e) => {
                self.metrics.cache().record_error();
                return Err(e);
            }
        };
        self.stats.record_origin_fetch();

        match serde_json::to_value(&value) {
            Ok(json) => self.store(key, json, options.ttl()).await,
            Err(e) => self.absorb("serialize", key.as_str(), &CacheError::from(e)),
        }

        if options.is_warm() {
            let warm = Self::warm_producer::<T, E, F, Fut>(producer);
            self.enqueue_warming(key.clone(), warm, options.ttl());
        }

        self.metrics.cache().observe_response_time(started.elapsed());
        Ok(value)
    }

    fn warm_producer<T, E, F, Fut>(producer: Arc<F>) -> WarmProducer
    where
        T: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Arc::new(move || {
            let producer = Arc::clone(&producer);
            async move {
                let value = (producer)().await.map_err(|e| ProducerError::new(e.to_string()))?;
                serde_json::to_value(&value).map_err(|e| ProducerError::new(e.to_string()))
            }
            .boxed()
        })
    }

    /// Write Tier-1 unconditionally and Tier-2 best-effort.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.store(key, json, ttl).await,
            Err(e) => self.absorb("serialize", key.as_str(), &CacheError::from(e)),
        }
    }

    async fn store(&self, key: &CacheKey, value: Value, ttl: Duration) {
        if let Err(e) = self.l2.set(key, &value, ttl).await {
            self.absorb("set", key.as_str(), &e);
        }
        self.l1.insert(key.clone(), value, ttl);
    }

    /// Read every key, serving Tier-1 first, then one multi-key Tier-2
    /// lookup, then a single producer call for whatever is still missing.
    /// The result is aligned with `keys`. `options.warm` is not used here.
    pub async fn batch_get<T, E, F, Fut>(
        &self,
        keys: &[CacheKey],
        producer: F,
        options: CacheOptions,
    ) -> Result<Vec<Option<T>>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Vec<CacheKey>) -> Fut,
        Fut: Future<Output = Result<Vec<Option<T>>, E>>,
    {
        let started = Instant::now();
        self.metrics.cache().record_request();

        let mut results: Vec<Option<T>> = keys.iter().map(|_| None).collect();
        let mut pending = Vec::new();

        for (idx, key) in keys.iter().enumerate() {
            match self.l1.get(key).map(decode::<T>) {
                Some(Ok(hit)) => {
                    self.stats.record_l1_hit();
                    results[idx] = Some(hit);
                }
                Some(Err(e)) => {
                    self.l1.remove(key);
                    self.absorb("l1_decode", key.as_str(), &e);
                    self.stats.record_l1_miss();
                    pending.push(idx);
                }
                None => {
                    self.stats.record_l1_miss();
                    pending.push(idx);
                }
            }
        }

        let mut missing = Vec::new();
        if !pending.is_empty() {
            let lookup: Vec<CacheKey> = pending.iter().map(|&i| keys[i].clone()).collect();
            match self.l2.get_many(&lookup).await {
                Ok(found) => {
                    let mut found = found.into_iter();
                    for &idx in &pending {
                        let key = &keys[idx];
                        let hit = found
                            .next()
                            .flatten()
                            .and_then(|value| decode::<T>(value.clone()).ok().map(|v| (v, value)));
                        match hit {
                            Some((decoded, raw)) => {
                                self.stats.record_l2_hit();
                                self.l1.insert(key.clone(), raw, options.ttl());
                                results[idx] = Some(decoded);
                            }
                            None => {
                                self.stats.record_l2_miss();
                                missing.push(idx);
                            }
                        }
                    }
                }
                Err(e) => {
                    self.absorb("get_many", &format!("{} keys", lookup.len()), &e);
                    for &idx in &pending {
                        self.stats.record_l2_miss();
                        missing.push(idx);
                    }
                }
            }
        }

        if !missing.is_empty() {
            let wanted: Vec<CacheKey> = missing.iter().map(|&i| keys[i].clone()).collect();
            let produced = match producer(wanted).await {
                Ok(produced) => produced,
                Err(e) => {
                    self.metrics.cache().record_error();
                    return Err(e);
                }
            };
            if produced.len() != missing.len() {
                warn!(
                    expected = missing.len(),
                    got = produced.len(),
                    "Batch producer returned misaligned results; extra entries ignored"
                );
            }

            for (&idx, value) in missing.iter().zip(produced) {
                self.stats.record_origin_fetch();
                if let Some(value) = value {
                    self.set(&keys[idx], &value, options.ttl()).await;
                    results[idx] = Some(value);
                }
            }
        }

        self.metrics.cache().observe_response_time(started.elapsed());
        Ok(results)
    }

    /// Read through both tiers without a producer. Statistics are untouched.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(value) = self.l1.get(key) {
            return Some(CacheEntry {
                key: key.clone(),
                value,
                tier: CacheTier::L1,
            });
        }
        match self.l2.get(key).await {
            Ok(Some(value)) => {
                self.l1.insert(key.clone(), value.clone(), self.config.default_ttl);
                Some(CacheEntry {
                    key: key.clone(),
                    value,
                    tier: CacheTier::L2,
                })
            }
            Ok(None) => None,
            Err(e) => {
                self.absorb("lookup", key.as_str(), &e);
                None
            }
        }
    }

    /// Remove every key containing `pattern` from both tiers. An empty
    /// pattern flushes everything.
    ///
    /// Tier-2 goes first: a concurrent `get` during the delete may still
    /// promote the old Tier-2 value, and the Tier-1 pass afterwards drops it.
    pub async fn invalidate(&self, pattern: &str) -> Invalidation {
        let l2_removed = match self.l2.delete_matching(pattern).await {
            Ok(n) => Some(n),
            Err(e) => {
                self.absorb("invalidate", pattern, &e);
                None
            }
        };
        let l1_removed = self.l1.remove_matching(pattern);
        info!(pattern, l1_removed, ?l2_removed, "Cache invalidated");
        Invalidation {
            l1_removed,
            l2_removed,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.l1.len())
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Cache statistics reset");
    }

    pub fn enqueue_warming(&self, key: CacheKey, producer: WarmProducer, ttl: Duration) -> bool {
        let queued = self.warming.enqueue(WarmingTask { key: key.clone(), producer, ttl });
        if queued {
            debug!(key = %key, "Queued key for warming");
        }
        queued
    }

    pub fn pending_warming(&self) -> usize {
        self.warming.len()
    }

    /// Run one warming pass over at most `warm_batch_size` tasks.
    /// Returns how many keys were refreshed.
    pub async fn run_warming_sweep(&self) -> usize {
        let batch = self.warming.dequeue_batch(self.config.warm_batch_size);
        if batch.is_empty() {
            return 0;
        }

        let runs = batch.into_iter().map(|task| async move {
            let outcome = (task.producer)().await;
            (task, outcome)
        });

        let mut warmed = 0;
        for (task, outcome) in join_all(runs).await {
            match outcome {
                Ok(value) => {
                    self.store(&task.key, value, task.ttl).await;
                    warmed += 1;
                }
                Err(e) => self.observer.warming_failed(&task.key, &e),
            }
        }
        debug!(warmed, "Warming sweep complete");
        warmed
    }

    /// Spawn the periodic warming sweep. The task stops when the handle is
    /// dropped or the coordinator is gone.
    pub fn start_warming(self: &Arc<Self>) -> WarmingHandle {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.warm_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                coordinator.run_warming_sweep().await;
            }
        });

        WarmingHandle { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::shared_memory::SharedMemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator() -> (CacheCoordinator, Arc<SharedMemoryCache>) {
        let l2 = Arc::new(SharedMemoryCache::new());
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let coordinator = CacheCoordinator::new(CacheConfig::default(), l2.clone(), metrics);
        (coordinator, l2)
    }

    #[tokio::test]
    async fn test_miss_then_l1_hit() {
        let (cache, l2) = coordinator();
        let key = CacheKey::from("hotel:v1:aaaa");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let value: String = cache
                .get(
                    &key,
                    move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Ok::<_, String>("fresh".to_string()) }
                    },
                    CacheOptions::default(),
                )
                .await
                .unwrap();
            assert_eq!(value, "fresh");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(l2.contains(&key));
        let stats = cache.stats();
        assert_eq!(stats.l1_misses, 1);
        assert_eq!(stats.l1_hits, 1);
        assert_eq!(stats.origin_fetches, 1);
    }

    #[tokio::test]
    async fn test_producer_error_propagates_and_is_not_cached() {
        let (cache, l2) = coordinator();
        let key = CacheKey::from("hotel:v1:bbbb");
        let result: Result<u32, String> = cache
            .get(&key, || async { Err("origin down".to_string()) }, CacheOptions::default())
            .await;

        assert_eq!(result, Err("origin down".to_string()));
        assert!(!l2.contains(&key));
        assert!(!cache.memory_tier().contains(&key));
        assert_eq!(cache.stats().origin_fetches, 0);
    }

    #[tokio::test]
    async fn test_warm_option_enqueues_and_sweep_refreshes() {
        let (cache, _l2) = coordinator();
        let key = CacheKey::from("hotel:v1:cccc");
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        let opts = CacheOptions::default().warm();
        let first: usize = cache
            .get(
                &key,
                move || {
                    let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, String>(n) }
                },
                opts,
            )
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(cache.pending_warming(), 1);

        assert_eq!(cache.run_warming_sweep().await, 1);
        assert_eq!(cache.pending_warming(), 0);
        assert_eq!(cache.lookup(&key).await.unwrap().value, serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_failed_warming_is_dropped() {
        let (cache, _l2) = coordinator();
        let producer: WarmProducer =
            Arc::new(|| async { Err::<serde_json::Value, _>(ProducerError::new("boom")) }.boxed());
        assert!(cache.enqueue_warming(CacheKey::from("k"), producer.clone(), Duration::from_secs(5)));
        assert!(!cache.enqueue_warming(CacheKey::from("k"), producer, Duration::from_secs(5)));

        assert_eq!(cache.run_warming_sweep().await, 0);
        assert_eq!(cache.pending_warming(), 0);
        assert!(cache.lookup(&CacheKey::from("k")).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_reports_tier() {
        let (cache, l2) = coordinator();
        let key = CacheKey::from("hotel:v1:dddd");
        l2.set(&key, &serde_json::json!("shared"), Duration::from_secs(60)).await.unwrap();

        let first = cache.lookup(&key).await.unwrap();
        assert_eq!(first.tier, CacheTier::L2);
        let second = cache.lookup(&key).await.unwrap();
        assert_eq!(second.tier, CacheTier::L1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_warming_runs_on_interval() {
        let l2 = Arc::new(SharedMemoryCache::new());
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let config = CacheConfig {
            warm_interval: Duration::from_secs(30),
            ..CacheConfig::default()
        };
        let cache = Arc::new(CacheCoordinator::new(config, l2.clone(), metrics));
        let producer: WarmProducer =
            Arc::new(|| async { Ok::<_, ProducerError>(serde_json::json!("warmed")) }.boxed());
        cache.enqueue_warming(CacheKey::from("w"), producer, Duration::from_secs(60));

        let handle = cache.start_warming();
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.pending_warming(), 0);
        assert!(l2.contains(&CacheKey::from("w")));
        handle.stop();
    }
}
