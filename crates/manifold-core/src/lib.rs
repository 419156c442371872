//! # Manifold Core
//!
//! Request-orchestration core for answering read-only queries (prices, gas
//! estimates, RPC calls) by fanning out to many redundant, unreliable,
//! latency-variable endpoints, then merging, caching, and racing their
//! responses under a caller-supplied time budget.
//!
//! The core knows nothing about what the queries mean; it operates on
//! opaque partitions, fields, keys, and asynchronous producers of values.
//! Per-provider adapters, metadata tables, and service wiring live in the
//! embedding application behind the [`source::Source`],
//! [`cache::Calculate`], and [`router::Transport`] traits.
//!
//! - **[`cache`]**: deduplicating cache — fresh values served immediately,
//!   at most one in-flight calculation per key across concurrent callers,
//!   two-tier stale policy (fresh / stale-but-usable-on-failure), bounded
//!   LRU storage.
//!
//! - **[`source`]**: source combinators — first-success-wins racing,
//!   priority-ordered fallback, and numeric aggregation, each composing a
//!   list of interchangeable sources into one logical source.
//!
//! - **[`router`]**: adaptive transport routing with rolling
//!   success/latency scoring, retry, and penalty-based exclusion that
//!   self-heals as samples age out.
//!
//! - **[`task`]**: the primitives everything else shares — deadline
//!   wrapping with a distinguishable timeout error, and lazily-started
//!   memoized async tasks.
//!
//! - **[`config`]**: layered configuration (defaults → TOML file →
//!   `MANIFOLD_*` environment), validated eagerly at load.
//!
//! ## Layering
//!
//! ```text
//! DedupCache ──calculate──► combinator (race / fallback / aggregate)
//!                                 │ fetch (scoped, shaved timeout)
//!                                 ▼
//!                           Source adapters ──► AdaptiveRouter ──► Transports
//! ```
//!
//! The cache's calculation step and every combinator fan-out go through the
//! timeout wrapper; an outer deadline is shaved by a fixed margin before it
//! propagates inward so outer bookkeeping can still run after an inner
//! expiry.

pub mod cache;
pub mod config;
pub mod router;
pub mod source;
pub mod task;
