//! Integration tests for the manifold orchestration core.
//!
//! Test modules:
//!
//! - `cache_tests`: single-flight deduplication, freshness windows,
//!   stale-on-failure fallback, and LRU bounds
//! - `combinator_tests`: first-success-wins racing and priority-ordered
//!   fallback, including the partial-result end-to-end scenario
//! - `aggregation_tests`: numeric reduction laws and shape-family selection
//! - `router_tests`: eligibility, scoring, retry, and metric-window healing
//! - `feature_integration_tests`: cache + combinator + router wired
//!   together the way an embedding service does it
//! - `mock_infrastructure`: reusable scripted sources, transports, and
//!   calculators
//!
//! Time-sensitive tests run under `#[tokio::test(start_paused = true)]`
//! and drive the clock with `tokio::time::advance`, so freshness windows
//! and sample TTLs are exact rather than sleep-based.

#[cfg(test)]
mod cache_tests;





/// Mock infrastructure for testing
pub mod mock_infrastructure;
