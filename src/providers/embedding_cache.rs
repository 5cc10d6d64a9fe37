//! Bounded memoization of embedding calls.
//!
//! The cache is the only shared mutable state on the serving path. Two
//! properties matter under load:
//!
//! 1. **Bounded LRU** - a long-lived process must not grow without limit,
//!    so entries are capped at a configurable count.
//! 2. **Single-flight** - identical concurrent misses collapse into one
//!    upstream computation. Followers block on the leader's flight slot
//!    instead of issuing duplicate expensive calls.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::ProviderError;
use crate::providers::embedder::Embedder;

/// In-progress upstream call that followers wait on.
struct Flight {
    slot: Mutex<Option<Result<Arc<Vec<f32>>, ProviderError>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<Arc<Vec<f32>>, ProviderError>) {
        *self.slot.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Arc<Vec<f32>>, ProviderError> {
        let mut slot = self.slot.lock();
        while slot.is_none() {
            self.done.wait(&mut slot);
        }
        slot.as_ref()
            .cloned()
            .expect("flight slot filled before notify")
    }
}

/// LRU-bounded, single-flight embedding cache over an [`Embedder`].
pub struct EmbeddingCache {
    inner: Arc<dyn Embedder>,
    entries: Mutex<LruCache<String, Arc<Vec<f32>>>>,
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
}

impl EmbeddingCache {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    /// Embed `text`, memoized. Cache hits return immediately; a miss invokes
    /// the provider once even under concurrent identical requests. Provider
    /// failures are propagated and never cached.
    pub fn embed(&self, text: &str) -> Result<Arc<Vec<f32>>, ProviderError> {
        let key = cache_key(text);

        if let Some(hit) = self.entries.lock().get(&key) {
            return Ok(hit.clone());
        }

        let (flight, leader) = {
            let mut in_flight = self.in_flight.lock();
            // Re-check under the in-flight lock: a leader may have landed the
            // value between our cache probe and here.
            if let Some(hit) = self.entries.lock().get(&key) {
                return Ok(hit.clone());
            }
            match in_flight.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    in_flight.insert(key.clone(), flight.clone());
                    (flight, true)
                }
            }
        };

        if !leader {
            debug!(key_len = key.len(), "embed_single_flight_join");
            return flight.wait();
        }

        let result = self.inner.embed(&key).map(Arc::new);
        if let Ok(vector) = &result {
            self.entries.lock().put(key.clone(), vector.clone());
        }
        flight.complete(result.clone());
        self.in_flight.lock().remove(&key);
        result
    }

    /// Number of cached entries (test/diagnostic use).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize text into a cache key: trim and collapse whitespace runs so
/// visually identical prompts share one entry.
pub fn cache_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
