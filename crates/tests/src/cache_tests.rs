//! Integration tests for the deduplicating cache.
//!
//! Time-window tests run under a paused clock and drive it with
//! `tokio::time::advance`, so freshness boundaries are exact.

use crate::mock_infrastructure::MockCalculator;
use manifold_core::cache::{
    CacheConfig, DedupCache, ExpirationPolicy, Tolerance,
};
use std::{sync::Arc, time::Duration};
use tokio::time::advance;

fn policy(fresh_secs: u64, stale_secs: u64) -> ExpirationPolicy {
    ExpirationPolicy::new(
        Tolerance::Within(Duration::from_secs(fresh_secs)),
        Tolerance::Within(Duration::from_secs(stale_secs)),
    )
    .unwrap()
}

fn cache_with(
    calculator: Arc<MockCalculator>,
    policy: ExpirationPolicy,
    max_entries: usize,
) -> DedupCache<MockCalculator> {
    DedupCache::new(calculator, CacheConfig { policy, max_entries }).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_under_concurrency() {
    let calculator = Arc::new(MockCalculator::new().with_delay(Duration::from_millis(100)));
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);

    let key = "0xAbC".to_string();
    let lookups = (0..8).map(|_| cache.get_or_calculate_single(&key, Arc::new(()), None, None));
    let results = futures::future::join_all(lookups).await;

    assert_eq!(calculator.calls(), 1, "8 concurrent callers must share one calculation");
    for result in results {
        assert_eq!(result, Some(5.0));
    }
    assert_eq!(cache.stats().calculations_started, 1);
    assert_eq!(cache.stats().flights_joined, 7);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_call_attaches_and_batches_the_rest() {
    let calculator = Arc::new(MockCalculator::new().with_delay(Duration::from_millis(100)));
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);

    let first_keys = ["a".to_string()];
    let second_keys = ["a".to_string(), "b".to_string()];
    let first = cache.get_or_calculate(&first_keys, Arc::new(()), None, None);
    let second =
        cache.get_or_calculate(&second_keys, Arc::new(()), None, None);
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);

    // "a" was already in flight when the second call arrived, so its batch
    // covered only "b".
    let batches = calculator.batches();
    assert_eq!(batches, vec![vec!["a".to_string()], vec!["b".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn test_freshness_window() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);
    let key = "k".to_string();

    cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(calculator.calls(), 1);

    // 30s old: served from cache, no recomputation.
    advance(Duration::from_secs(30)).await;
    let cached = cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(cached, Some(1.0));
    assert_eq!(calculator.calls(), 1);

    // 61s old: recomputation triggered.
    advance(Duration::from_secs(31)).await;
    cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(calculator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expiration_override_tightens_the_window() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);
    let key = "k".to_string();

    cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    advance(Duration::from_secs(30)).await;

    // 30s old passes the configured 60s window but not the override's 10s.
    let tight = policy(10, 600);
    cache.get_or_calculate_single(&key, Arc::new(()), Some(&tight), None).await;
    assert_eq!(calculator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_value_served_when_calculation_fails() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);
    let key = "k".to_string();

    cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;

    // 5 minutes old and the calculator is now down: the stale value is
    // within the 10-minute failure-tolerant tier, so it is still served.
    advance(Duration::from_secs(300)).await;
    calculator.set_fail(true);
    let stale = cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(stale, Some(1.0));
    assert_eq!(calculator.calls(), 2);
    assert_eq!(cache.stats().stale_fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_too_stale_entry_is_evicted_on_failure() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);
    let key = "k".to_string();

    cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;

    // 11 minutes old exceeds even the failure-tolerant tier: the key is
    // absent from the result and the entry is gone.
    advance(Duration::from_secs(660)).await;
    calculator.set_fail(true);
    let gone = cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(gone, None);
    assert_eq!(cache.stats().entries, 0);

    // Once the calculator recovers the key computes again, with no stale
    // carcass resurrected in between.
    calculator.set_fail(false);
    let recovered = cache.get_or_calculate_single(&key, Arc::new(()), None, None).await;
    assert_eq!(recovered, Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_calculation_timeout_falls_back_to_stale() {
    let calculator = Arc::new(MockCalculator::new().with_delay(Duration::from_secs(30)));
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);
    let key = "k".to_string();

    // Seed without racing the slow calculator.
    cache.populate(std::collections::HashMap::from([(key.clone(), 42.0)]));
    advance(Duration::from_secs(61)).await;

    // Recomputation exceeds the 1s budget; the 61s-old entry is still
    // within the failure-tolerant tier and is served instead.
    let result = cache
        .get_or_calculate_single(&key, Arc::new(()), None, Some(Duration::from_secs(1)))
        .await;
    assert_eq!(result, Some(42.0));
    assert_eq!(cache.stats().stale_fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_lru_bound_evicts_exactly_one() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 3);

    for key in ["a", "b", "c"] {
        cache.get_or_calculate_single(&key.to_string(), Arc::new(()), None, None).await;
    }
    assert_eq!(cache.stats().entries, 3);

    // A fourth insert evicts exactly the least-recently-used entry.
    cache.get_or_calculate_single(&"d".to_string(), Arc::new(()), None, None).await;
    assert_eq!(cache.stats().entries, 3);
    assert!(!cache.holds_valid_value(&"a".to_string()));
    for key in ["b", "c", "d"] {
        assert!(cache.holds_valid_value(&key.to_string()), "{key} should have survived");
    }
}

#[tokio::test(start_paused = true)]
async fn test_access_refreshes_recency() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 2);

    cache.get_or_calculate_single(&"a".to_string(), Arc::new(()), None, None).await;
    cache.get_or_calculate_single(&"b".to_string(), Arc::new(()), None, None).await;

    // Re-reading "a" makes "b" the eviction victim.
    cache.get_or_calculate_single(&"a".to_string(), Arc::new(()), None, None).await;
    cache.get_or_calculate_single(&"c".to_string(), Arc::new(()), None, None).await;

    assert!(cache.holds_valid_value(&"a".to_string()));
    assert!(!cache.holds_valid_value(&"b".to_string()));
    assert!(cache.holds_valid_value(&"c".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_holds_valid_values_and_populate() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);

    cache.populate(std::collections::HashMap::from([
        ("a".to_string(), 1.0),
        ("b".to_string(), 2.0),
    ]));

    assert!(cache.holds_valid_values(&["a".to_string(), "b".to_string()]));
    assert!(!cache.holds_valid_values(&["a".to_string(), "missing".to_string()]));
    assert_eq!(calculator.calls(), 0);

    // Probing never triggers calculation even for a stale entry.
    advance(Duration::from_secs(61)).await;
    assert!(!cache.holds_valid_value(&"a".to_string()));
    assert_eq!(calculator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keys_normalize_case_insensitively() {
    let calculator = Arc::new(MockCalculator::new());
    let cache = cache_with(Arc::clone(&calculator), policy(60, 600), 16);

    cache.get_or_calculate_single(&"0xDEAD".to_string(), Arc::new(()), None, None).await;
    // The same address in another case is the same unit of work.
    let hit = cache.get_or_calculate_single(&"0xdead".to_string(), Arc::new(()), None, None).await;
    assert_eq!(hit, Some(6.0));
    assert_eq!(calculator.calls(), 1);
}
