//! Deduplicating cache over a batch-capable calculation collaborator.
//!
//! `DedupCache` answers key lookups from a bounded LRU store when entries
//! are fresh, and otherwise starts at most one batched calculation per key
//! across all concurrent callers. Overlapping callers attach to the
//! existing in-flight calculation instead of starting their own. When a
//! calculation fails or omits a key, a stale entry may still be served
//! under the failure-tolerant tier of the [`ExpirationPolicy`]; an entry
//! too old even for that tier is evicted.
//!
//! A requested key is absent from the result only when the fresh, in-flight,
//! and failure-tolerant routes all failed. Per-key failure is never an
//! error.

use super::{
    policy::ExpirationPolicy,
    store::{CacheEntry, LruStore},
};
use crate::task::timeout::{with_timeout, TimeoutError};
use async_trait::async_trait;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failure of a batched calculation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CalculationError {
    /// The calculation exceeded the caller's deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The calculation collaborator reported a failure.
    #[error("calculation failed: {0}")]
    Failed(String),
}

/// Invalid cache configuration detected at construction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheConfigError {
    #[error("max_entries must be greater than zero")]
    ZeroCapacity,
}

/// Batch-capable calculation collaborator.
///
/// Implementations are typically thin adapters over a source combinator or
/// an external API client. `calculate` must be safe for concurrent calls
/// over disjoint key sets; the cache guarantees it never issues two
/// concurrent calculations covering the same key.
#[async_trait]
pub trait Calculate: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;
    type Context: Send + Sync + 'static;

    /// Stringifies a key for storage and in-flight bookkeeping.
    ///
    /// Two distinct logical keys must map to distinct strings — the cache
    /// treats equal normalized forms as the same unit of work. Address-like
    /// keys commonly lowercase here; keys where case is significant must
    /// use a case-preserving normalization.
    fn normalize_key(key: &Self::Key) -> String;

    /// Computes values for a batch of keys.
    ///
    /// A key absent from the returned map is not an error; it simply was
    /// not answered.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError`] when the batch as a whole fails.
    async fn calculate(
        &self,
        ctx: &Self::Context,
        keys: &[Self::Key],
    ) -> Result<HashMap<Self::Key, Self::Value>, CalculationError>;
}

/// Cache sizing and expiration configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub policy: ExpirationPolicy,
    pub max_entries: usize,
}

/// Point-in-time counters for cache observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub calculations_started: u64,
    pub flights_joined: u64,
    pub stale_fallbacks: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    calculations_started: AtomicU64,
    flights_joined: AtomicU64,
    stale_fallbacks: AtomicU64,
    evictions: AtomicU64,
}

type FlightOutput<C> = Result<
    Arc<HashMap<<C as Calculate>::Key, <C as Calculate>::Value>>,
    Arc<CalculationError>,
>;

/// A shared in-flight calculation, registered under every key it covers.
type Flight<C> = Shared<BoxFuture<'static, FlightOutput<C>>>;

struct CacheState<C: Calculate> {
    store: LruStore<C::Value>,
    inflight: HashMap<String, Flight<C>>,
}

/// Deduplicating cache with single-flight batched calculation.
///
/// Cloning is cheap Arc reference counting; all clones share the same store
/// and in-flight bookkeeping.
pub struct DedupCache<C: Calculate> {
    calculator: Arc<C>,
    config: CacheConfig,
    state: Arc<Mutex<CacheState<C>>>,
    stats: Arc<StatCounters>,
}

impl<C: Calculate> Clone for DedupCache<C> {
    fn clone(&self) -> Self {
        Self {
            calculator: Arc::clone(&self.calculator),
            config: self.config,
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<C: Calculate> DedupCache<C> {
    /// Creates a cache around a calculation collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`CacheConfigError::ZeroCapacity`] when `max_entries` is 0.
    pub fn new(calculator: Arc<C>, config: CacheConfig) -> Result<Self, CacheConfigError> {
        if config.max_entries == 0 {
            return Err(CacheConfigError::ZeroCapacity);
        }
        Ok(Self {
            calculator,
            config,
            state: Arc::new(Mutex::new(CacheState {
                store: LruStore::new(config.max_entries),
                inflight: HashMap::new(),
            })),
            stats: Arc::new(StatCounters::default()),
        })
    }

    /// Returns cached values for `keys`, calculating the rest.
    ///
    /// Fresh entries are returned immediately. All stale-or-missing keys
    /// without an existing flight are covered by exactly one batched
    /// calculation; keys another caller is already computing attach to that
    /// caller's flight. Keys still unanswered after calculation fall back
    /// to a failure-tolerant stale entry or are dropped from the result
    /// (and evicted) — never raised as an error.
    pub async fn get_or_calculate(
        &self,
        keys: &[C::Key],
        ctx: Arc<C::Context>,
        expiration_override: Option<&ExpirationPolicy>,
        timeout: Option<Duration>,
    ) -> HashMap<C::Key, C::Value> {
        let policy = expiration_override.copied().unwrap_or(self.config.policy);
        let mut results: HashMap<C::Key, C::Value> = HashMap::new();

        // Duplicate request keys collapse onto one normalized unit of work.
        let mut wanted: Vec<(C::Key, String)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for key in keys {
            let norm = C::normalize_key(key);
            if seen.insert(norm.clone()) {
                wanted.push((key.clone(), norm));
            }
        }

        let mut flights: Vec<Flight<C>> = Vec::new();
        {
            // Atomic section: the fresh-vs-stale partition and the flight
            // registration must happen under one lock so overlapping calls
            // never register two flights for the same key. No awaits occur
            // while the lock is held.
            let mut state = self.state.lock();
            let now = Instant::now();
            let mut batch: Vec<C::Key> = Vec::new();
            let mut batch_norms: Vec<String> = Vec::new();

            for (key, norm) in &wanted {
                let fresh = match state.store.get(norm) {
                    Some(entry) if policy.is_fresh(entry.age(now)) => Some(entry.value.clone()),
                    _ => None,
                };
                if let Some(value) = fresh {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    results.insert(key.clone(), value);
                    continue;
                }
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                if let Some(flight) = state.inflight.get(norm) {
                    self.stats.flights_joined.fetch_add(1, Ordering::Relaxed);
                    push_unique::<C>(&mut flights, flight.clone());
                } else {
                    batch.push(key.clone());
                    batch_norms.push(norm.clone());
                }
            }

            if !batch.is_empty() {
                self.stats.calculations_started.fetch_add(1, Ordering::Relaxed);
                debug!(keys = batch.len(), "starting batched calculation");
                let flight = self.start_flight(batch, Arc::clone(&ctx), timeout);
                for norm in &batch_norms {
                    state.inflight.insert(norm.clone(), flight.clone());
                }
                push_unique::<C>(&mut flights, flight);
            }
        }

        let outcomes = futures::future::join_all(flights.iter().cloned()).await;

        // Settlement bookkeeping, all under one lock: deregister the
        // flights just observed settling (a successor flight registered in
        // the meantime is left alone), write every produced value to the
        // store, then resolve still-missing keys through the
        // failure-tolerant tier.
        let mut state = self.state.lock();
        let now = Instant::now();

        for (_, norm) in &wanted {
            let settled_here =
                state.inflight.get(norm).is_some_and(|current| {
                    flights.iter().any(|flight| flight.ptr_eq(current))
                });
            if settled_here {
                state.inflight.remove(norm);
            }
        }

        // Values keyed by normalized form so a calculator returning a
        // differently-spelled key still answers the caller's key.
        let mut settled: HashMap<String, C::Value> = HashMap::new();
        for outcome in &outcomes {
            match outcome {
                Ok(values) => {
                    for (key, value) in values.iter() {
                        let norm = C::normalize_key(key);
                        if state.store.insert(norm.clone(), value.clone(), now).is_some() {
                            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                        }
                        settled.entry(norm).or_insert_with(|| value.clone());
                    }
                }
                Err(error) => {
                    debug!(error = %error, "batched calculation settled with failure");
                }
            }
        }

        for (key, norm) in wanted {
            if results.contains_key(&key) {
                continue;
            }
            if let Some(value) = settled.get(&norm) {
                results.insert(key, value.clone());
                continue;
            }
            let usable = match state.store.peek(&norm) {
                Some(entry) => policy.is_usable_on_failure(entry.age(now)),
                None => continue,
            };
            if usable {
                self.stats.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
                debug!(key = %norm, "serving stale value after failed calculation");
                if let Some(entry) = state.store.peek(&norm) {
                    results.insert(key, entry.value.clone());
                }
            } else {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                warn!(key = %norm, "evicting entry too stale for failure tolerance");
                state.store.remove(&norm);
            }
        }
        drop(state);

        results
    }

    /// One-key form of [`get_or_calculate`](Self::get_or_calculate).
    pub async fn get_or_calculate_single(
        &self,
        key: &C::Key,
        ctx: Arc<C::Context>,
        expiration_override: Option<&ExpirationPolicy>,
        timeout: Option<Duration>,
    ) -> Option<C::Value> {
        self.get_or_calculate(std::slice::from_ref(key), ctx, expiration_override, timeout)
            .await
            .remove(key)
    }

    /// Force-writes entries, bypassing calculation.
    pub fn populate(&self, values: HashMap<C::Key, C::Value>) {
        let mut state = self.state.lock();
        let now = Instant::now();
        for (key, value) in values {
            if state.store.insert(C::normalize_key(&key), value, now).is_some() {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Whether a fresh value is cached for `key`. Never triggers
    /// calculation and never perturbs eviction order.
    #[must_use]
    pub fn holds_valid_value(&self, key: &C::Key) -> bool {
        let state = self.state.lock();
        let now = Instant::now();
        Self::entry_is_fresh(state.store.peek(&C::normalize_key(key)), &self.config.policy, now)
    }

    /// Whether fresh values are cached for every key in `keys`.
    #[must_use]
    pub fn holds_valid_values(&self, keys: &[C::Key]) -> bool {
        let state = self.state.lock();
        let now = Instant::now();
        keys.iter().all(|key| {
            Self::entry_is_fresh(state.store.peek(&C::normalize_key(key)), &self.config.policy, now)
        })
    }

    /// Point-in-time snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            calculations_started: self.stats.calculations_started.load(Ordering::Relaxed),
            flights_joined: self.stats.flights_joined.load(Ordering::Relaxed),
            stale_fallbacks: self.stats.stale_fallbacks.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries: self.state.lock().store.len(),
        }
    }

    fn entry_is_fresh(
        entry: Option<&CacheEntry<C::Value>>,
        policy: &ExpirationPolicy,
        now: Instant,
    ) -> bool {
        entry.is_some_and(|entry| policy.is_fresh(entry.age(now)))
    }

    fn start_flight(
        &self,
        batch: Vec<C::Key>,
        ctx: Arc<C::Context>,
        timeout: Option<Duration>,
    ) -> Flight<C> {
        let calculator = Arc::clone(&self.calculator);
        async move {
            let result =
                with_timeout("cache calculation", timeout, calculator.calculate(&ctx, &batch))
                    .await;
            match result {
                Ok(Ok(values)) => Ok(Arc::new(values)),
                Ok(Err(error)) => Err(Arc::new(error)),
                Err(expired) => Err(Arc::new(CalculationError::Timeout(expired))),
            }
        }
        .boxed()
        .shared()
    }
}

fn push_unique<C: Calculate>(flights: &mut Vec<Flight<C>>, flight: Flight<C>) {
    if !flights.iter().any(|existing| existing.ptr_eq(&flight)) {
        flights.push(flight);
    }
}
