// tests/cache_tiers.rs
// Coordinator behavior across both tiers, with the shared tier in-process

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use hotelcache::cache::coordinator::Invalidation;
use hotelcache::cache::warming::WarmProducer;
use hotelcache::cache::{
    build_key, CacheCoordinator, CacheKey, CacheObserver, CacheTier, Params, SharedCache,
    SharedMemoryCache,
};
use hotelcache::config::{CacheConfig, CacheOptions};
use hotelcache::error::{CacheError, ProducerError};
use hotelcache::monitoring::MetricsRecorder;

#[derive(Default)]
struct RecordingObserver {
    tier_errors: Mutex<Vec<(String, String)>>,
}

impl CacheObserver for RecordingObserver {
    fn tier_error(&self, operation: &'static str, key: &str, _error: &CacheError) {
        self.tier_errors.lock().push((operation.to_string(), key.to_string()));
    }

    fn warming_failed(&self, _key: &CacheKey, _error: &ProducerError) {}
}

struct Harness {
    coordinator: CacheCoordinator,
    l2: Arc<SharedMemoryCache>,
    observer: Arc<RecordingObserver>,
    metrics: Arc<MetricsRecorder>,
}

fn harness() -> Harness {
    let l2 = Arc::new(SharedMemoryCache::new());
    let observer = Arc::new(RecordingObserver::default());
    let metrics = Arc::new(MetricsRecorder::new().unwrap());
    let coordinator = CacheCoordinator::new(CacheConfig::default(), l2.clone(), metrics.clone())
        .with_observer(observer.clone());
    Harness {
        coordinator,
        l2,
        observer,
        metrics,
    }
}

/// Shared tier whose pattern delete holds until the test releases it.
#[derive(Default)]
struct GatedTier {
    inner: SharedMemoryCache,
    delete_started: Notify,
    release: Notify,
}

#[async_trait]
impl SharedCache for GatedTier {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        self.delete_started.notify_one();
        self.release.notified().await;
        self.inner.delete_matching(pattern).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.inner.ping().await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

fn options() -> CacheOptions {
    CacheOptions::with_ttl_secs(60).unwrap()
}

#[test]
fn key_is_independent_of_insertion_order() {
    let mut a = Params::new();
    a.insert("checkinDate".to_string(), "2026-11-02".into());
    a.insert("adultNum".to_string(), 2i64.into());
    a.insert("keyword".to_string(), "京都".into());

    let mut b = Params::new();
    b.insert("keyword".to_string(), "京都".into());
    b.insert("checkinDate".to_string(), "2026-11-02".into());
    b.insert("adultNum".to_string(), 2i64.into());

    assert_eq!(build_key("hotel:search", 2, &a), build_key("hotel:search", 2, &b));
}

#[tokio::test]
async fn tier2_hit_is_promoted_into_tier1() {
    let h = harness();
    let key = CacheKey::from("hotel:search:v1:0001");
    h.l2.set(&key, &json!("from-l2"), Duration::from_secs(60)).await.unwrap();
    assert!(!h.coordinator.memory_tier().contains(&key));

    let value: String = h
        .coordinator
        .get(&key, || async { Ok::<_, String>("from-producer".to_string()) }, options())
        .await
        .unwrap();

    assert_eq!(value, "from-l2");
    assert!(h.coordinator.memory_tier().contains(&key));
    let entry = h.coordinator.lookup(&key).await.unwrap();
    assert_eq!(entry.tier, CacheTier::L1);
    assert_eq!(h.coordinator.stats().l2_hits, 1);
}

#[tokio::test]
async fn batch_get_preserves_request_order() {
    let h = harness();
    let k1 = CacheKey::from("hotel:detail:v1:k1");
    let k2 = CacheKey::from("hotel:detail:v1:k2");
    let k3 = CacheKey::from("hotel:detail:v1:k3");

    // k1 in Tier-1, k2 only in Tier-2, k3 nowhere
    h.coordinator.set(&k1, &"v(k1)", Duration::from_secs(60)).await;
    h.l2.set(&k2, &json!("v(k2)"), Duration::from_secs(60)).await.unwrap();

    let asked = Arc::new(Mutex::new(Vec::new()));
    let asked_by_producer = asked.clone();
    let values: Vec<Option<String>> = h
        .coordinator
        .batch_get(
            &[k3.clone(), k1.clone(), k2.clone()],
            move |missing: Vec<CacheKey>| async move {
                asked_by_producer.lock().extend(missing.iter().cloned());
                Ok::<_, String>(missing.iter().map(|_| Some("v(k3)".to_string())).collect())
            },
            options(),
        )
        .await
        .unwrap();

    assert_eq!(
        values,
        vec![
            Some("v(k3)".to_string()),
            Some("v(k1)".to_string()),
            Some("v(k2)".to_string()),
        ]
    );
    assert_eq!(*asked.lock(), vec![k3.clone()]);

    let stats = h.coordinator.stats();
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.origin_fetches, 1);
    assert!(h.l2.contains(&k3));
}

#[tokio::test]
async fn tier2_outage_falls_through_to_producer() {
    let h = harness();
    h.l2.set_offline(true);
    let key = CacheKey::from("hotel:search:v1:outage");

    let value: u64 = h
        .coordinator
        .get(&key, || async { Ok::<_, String>(42u64) }, options())
        .await
        .unwrap();
    assert_eq!(value, 42);

    // Tier-1 still got the value, so the next read never touches Tier-2
    let again: u64 = h
        .coordinator
        .get(&key, || async { Ok::<_, String>(7u64) }, options())
        .await
        .unwrap();
    assert_eq!(again, 42);

    let errors = h.observer.tier_errors.lock().clone();
    assert!(errors.contains(&("get".to_string(), key.to_string())));
    assert!(errors.contains(&("set".to_string(), key.to_string())));
    assert_eq!(h.coordinator.stats().l2_errors, 2);
    assert_eq!(h.metrics.cache().snapshot().errors, 2);
}

#[tokio::test]
async fn producer_error_reaches_caller_unchanged() {
    let h = harness();
    let key = CacheKey::from("hotel:search:v1:failing");

    let result: Result<String, String> = h
        .coordinator
        .get(&key, || async { Err::<String, _>("provider exploded".to_string()) }, options())
        .await;

    assert_eq!(result, Err("provider exploded".to_string()));
    assert!(h.coordinator.lookup(&key).await.is_none());
}

#[tokio::test]
async fn invalidate_removes_matching_keys_from_both_tiers() {
    let h = harness();
    let target = CacheKey::from("hotel:search:v2:abcd");
    let other = CacheKey::from("hotel:detail:v2:ef01");
    h.coordinator.set(&target, &"v", Duration::from_secs(60)).await;
    h.coordinator.set(&other, &"keep", Duration::from_secs(60)).await;

    let removed = h.coordinator.invalidate("hotel:search").await;
    assert_eq!(
        removed,
        Invalidation {
            l1_removed: 1,
            l2_removed: Some(1),
        }
    );
    assert!(h.coordinator.lookup(&target).await.is_none());
    assert!(!h.l2.contains(&target));
    assert!(h.l2.contains(&other));

    let value: String = h
        .coordinator
        .get(&target, || async { Ok::<_, String>("fresh".to_string()) }, options())
        .await
        .unwrap();
    assert_eq!(value, "fresh");
}

#[tokio::test]
async fn invalidate_with_tier2_down_still_clears_tier1() {
    let h = harness();
    let key = CacheKey::from("hotel:search:v1:down");
    h.coordinator.set(&key, &"v", Duration::from_secs(60)).await;
    h.l2.set_offline(true);

    let removed = h.coordinator.invalidate("hotel:search").await;
    assert_eq!(removed.l1_removed, 1);
    assert_eq!(removed.l2_removed, None);
    assert!(!h.coordinator.memory_tier().contains(&key));
}

#[tokio::test]
async fn stats_count_first_misses_then_hits() {
    let h = harness();
    let n = 5;
    let keys: Vec<CacheKey> = (0..n)
        .map(|i| CacheKey::from(format!("hotel:search:v1:{:04}", i)))
        .collect();

    for (i, key) in keys.iter().enumerate() {
        let _: usize = h
            .coordinator
            .get(key, move || async move { Ok::<_, String>(i) }, options())
            .await
            .unwrap();
    }
    let first = h.coordinator.stats();
    assert_eq!(first.l1_hits + first.l1_misses, n as u64);
    assert_eq!(first.l1_misses, n as u64);

    for key in &keys {
        let _: usize = h
            .coordinator
            .get(key, || async { Ok::<_, String>(usize::MAX) }, options())
            .await
            .unwrap();
    }
    let second = h.coordinator.stats();
    assert_eq!(second.l1_hits, first.l1_hits + n as u64);
    assert_eq!(second.l1_misses, first.l1_misses);
    assert_eq!(second.l1_entries, n);

    h.coordinator.reset_stats();
    assert_eq!(h.coordinator.stats().total_lookups(), 0);
}

#[tokio::test]
async fn read_during_invalidate_does_not_resurrect_old_value() {
    let l2 = Arc::new(GatedTier::default());
    let metrics = Arc::new(MetricsRecorder::new().unwrap());
    let coordinator = Arc::new(CacheCoordinator::new(CacheConfig::default(), l2.clone(), metrics));
    let key = CacheKey::from("hotel:search:v2:abcd");
    l2.inner.set(&key, &json!("v"), Duration::from_secs(60)).await.unwrap();

    let invalidating = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.invalidate("hotel:search").await })
    };
    l2.delete_started.notified().await;

    // Tier-2 still holds the old value here, so this read promotes it
    let during: String = coordinator
        .get(&key, || async { Ok::<_, String>("fresh".to_string()) }, options())
        .await
        .unwrap();
    assert_eq!(during, "v");
    assert!(coordinator.memory_tier().contains(&key));

    l2.release.notify_one();
    let removed = invalidating.await.unwrap();
    assert_eq!(removed.l2_removed, Some(1));
    assert_eq!(removed.l1_removed, 1);

    let after: String = coordinator
        .get(&key, || async { Ok::<_, String>("fresh".to_string()) }, options())
        .await
        .unwrap();
    assert_eq!(after, "fresh");
}

#[tokio::test]
async fn warming_sweep_is_capped_at_batch_size() {
    let h = harness();
    let batch = CacheConfig::default().warm_batch_size;
    let produce: WarmProducer = Arc::new(|| async { Ok::<_, ProducerError>(json!(1)) }.boxed());

    for i in 0..batch + 2 {
        let key = CacheKey::from(format!("hotel:search:v1:warm{:02}", i));
        assert!(h.coordinator.enqueue_warming(key, produce.clone(), Duration::from_secs(60)));
    }

    assert_eq!(h.coordinator.run_warming_sweep().await, batch);
    assert_eq!(h.coordinator.pending_warming(), 2);
    assert_eq!(h.coordinator.run_warming_sweep().await, 2);
    assert_eq!(h.coordinator.pending_warming(), 0);
}

#[tokio::test]
async fn batch_get_with_tier2_down_calls_producer_once() {
    let h = harness();
    h.l2.set_offline(true);
    let keys: Vec<CacheKey> = (0..3)
        .map(|i| CacheKey::from(format!("hotel:detail:v1:off{}", i)))
        .collect();

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let values: Vec<Option<String>> = h
        .coordinator
        .batch_get(
            &keys,
            move |missing: Vec<CacheKey>| async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(missing.iter().map(|k| Some(format!("v({})", k))).collect())
            },
            options(),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let expected: Vec<Option<String>> = keys.iter().map(|k| Some(format!("v({})", k))).collect();
    assert_eq!(values, expected);
    assert!(keys.iter().all(|k| h.coordinator.memory_tier().contains(k)));
    assert!(h
        .observer
        .tier_errors
        .lock()
        .iter()
        .any(|(operation, _)| operation == "get_many"));
}

#[tokio::test]
async fn batch_get_producer_error_is_returned_unchanged() {
    let h = harness();
    let keys = [
        CacheKey::from("hotel:detail:v1:e1"),
        CacheKey::from("hotel:detail:v1:e2"),
    ];

    let result: Result<Vec<Option<String>>, String> = h
        .coordinator
        .batch_get(
            &keys,
            |_missing: Vec<CacheKey>| async { Err("detail lookup failed".to_string()) },
            options(),
        )
        .await;

    assert_eq!(result, Err("detail lookup failed".to_string()));
    assert_eq!(h.metrics.cache().snapshot().errors, 1);
    for key in &keys {
        assert!(h.coordinator.lookup(key).await.is_none());
    }
}

#[tokio::test]
async fn batch_get_short_producer_output_leaves_tail_empty() {
    let h = harness();
    let keys = [
        CacheKey::from("hotel:detail:v1:s1"),
        CacheKey::from("hotel:detail:v1:s2"),
        CacheKey::from("hotel:detail:v1:s3"),
    ];

    let values: Vec<Option<String>> = h
        .coordinator
        .batch_get(
            &keys,
            |_missing: Vec<CacheKey>| async { Ok::<_, String>(vec![Some("only".to_string())]) },
            options(),
        )
        .await
        .unwrap();

    assert_eq!(values, vec![Some("only".to_string()), None, None]);
    assert!(h.coordinator.memory_tier().contains(&keys[0]));
    assert!(!h.coordinator.memory_tier().contains(&keys[1]));
    assert!(!h.coordinator.memory_tier().contains(&keys[2]));
}
