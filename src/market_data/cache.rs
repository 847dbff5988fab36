//! Per-(source,key) TTL cache with single-flight coalescing (spec.md §4.1,
//! §5 "Shared resources"): at most one in-flight upstream request per cache
//! key, others await the result. `DashMap` gives the lock-free-ish
//! per-bucket access the teacher favors for concurrent hot-path state
//! (`strategy/symbol_map.rs`); the single-flight discipline itself is
//! modeled on the teacher's `OpportunityQueue` producer/consumer
//! rendezvous pattern, adapted here to coalesce readers instead of
//! draining a queue.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// A value annotated with the non-fatal conditions spec.md §7 says must be
/// carried rather than raised: `StaleData` (served from cache past the
/// primary TTL but within the fallback window) and `Anomaly` (cross-source
/// divergence).
#[derive(Debug, Clone)]
pub struct Annotated<T> {
    pub value: T,
    pub stale: bool,
    pub anomaly: Option<String>,
}

impl<T> Annotated<T> {
    pub fn fresh(value: T) -> Self {
        Self { value, stale: false, anomaly: None }
    }
}

#[derive(Clone)]
struct Entry<T> {
    value: T,
    fetched_at_ms: u64,
}

pub struct TtlCache<T: Clone + Send + Sync + 'static> {
    entries: DashMap<String, Entry<T>>,
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for TtlCache<T> {
    fn default() -> Self {
        Self { entries: DashMap::new(), inflight: DashMap::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    /// Upstream fetch failed and no value within the staleness bound exists.
    Unavailable,
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.inflight.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Fetch `key`, serving from cache if fresh, coalescing concurrent
    /// misses onto one upstream call (single-flight), and falling back to
    /// a stale cached value within `stale_bound_ms` when the upstream call
    /// fails (per the circuit-breaker-open contract in spec.md §4.1).
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl_ms: u64,
        stale_bound_ms: u64,
        now_ms: u64,
        fetch: F,
    ) -> Result<Annotated<T>, CacheMiss>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(entry) = self.entries.get(key) {
            if now_ms.saturating_sub(entry.fetched_at_ms) <= ttl_ms {
                return Ok(Annotated::fresh(entry.value.clone()));
            }
        }

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        // Re-check: another task may have refreshed this key while we
        // waited for the single-flight lock.
        if let Some(entry) = self.entries.get(key) {
            if now_ms.saturating_sub(entry.fetched_at_ms) <= ttl_ms {
                return Ok(Annotated::fresh(entry.value.clone()));
            }
        }

        match fetch().await {
            Ok(value) => {
                self.entries.insert(key.to_string(), Entry { value: value.clone(), fetched_at_ms: now_ms });
                Ok(Annotated::fresh(value))
            }
            Err(_) => {
                if let Some(entry) = self.entries.get(key) {
                    let age = now_ms.saturating_sub(entry.fetched_at_ms);
                    if age <= stale_bound_ms {
                        eprintln!("[GATEWAY-CACHE] serving stale value for key={key} age_ms={age}");
                        return Ok(Annotated { value: entry.value.clone(), stale: true, anomaly: None });
                    }
                }
                Err(CacheMiss::Unavailable)
            }
        }
    }

    /// Number of keys currently holding an in-flight single-flight lock.
    /// Used by cancellation tests (spec.md §8.3 scenario 6) to assert the
    /// in-flight count returns to zero after a cancelled scan.
    pub fn inflight_count(&self) -> usize {
        self.inflight.iter().filter(|e| e.value().try_lock().is_err()).count()
    }
}
