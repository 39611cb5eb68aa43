// src/cache/warming.rs
// Background warming queue, deduplicated by key

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::key::CacheKey;
use crate::error::ProducerError;

pub type WarmProducer =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ProducerError>> + Send + Sync>;

#[derive(Clone)]
pub struct WarmingTask {
    pub key: CacheKey,
    pub producer: WarmProducer,
    pub ttl: Duration,
}

impl fmt::Debug for WarmingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmingTask")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<WarmingTask>,
    queued: HashSet<CacheKey>,
}

/// FIFO of pending warming tasks. A key is never queued twice at once;
/// tasks leave the queue the moment they are dequeued.
#[derive(Default)]
pub struct WarmingQueue {
    state: Mutex<QueueState>,
}

impl WarmingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the key is already queued.
    pub fn enqueue(&self, task: WarmingTask) -> bool {
        let mut state = self.state.lock();
        if !state.queued.insert(task.key.clone()) {
            return false;
        }
        state.tasks.push_back(task);
        true
    }

    pub fn dequeue_batch(&self, max: usize) -> Vec<WarmingTask> {
        let mut state = self.state.lock();
        let n = max.min(state.tasks.len());
        let batch: Vec<WarmingTask> = state.tasks.drain(..n).collect();
        for task in &batch {
            state.queued.remove(&task.key);
        }
        batch
    }

    pub fn is_queued(&self, key: &CacheKey) -> bool {
        self.state.lock().queued.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.tasks.clear();
        state.queued.clear();
    }
}
