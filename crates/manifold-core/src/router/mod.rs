//! Adaptive routing across interchangeable transports.
//!
//! The router scores every candidate transport from its rolling
//! success/latency window, issues the request on the best one, records the
//! attempt's outcome either way, and on failure retries on the next-best
//! transport. Excluded transports self-heal back into rotation once their
//! samples age out of the window or once they are the only option left.

pub mod errors;
pub mod metrics;

pub use errors::{RouterConfigError, RouterError, TransportError};
pub use metrics::MetricWindow;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Weight of the success-rate factor in a transport's score.
const SUCCESS_WEIGHT: f64 = 0.7;
/// Weight of the latency factor in a transport's score.
const LATENCY_WEIGHT: f64 = 0.3;
/// Latency normalization scale: one full second costs the whole latency
/// factor.
const LATENCY_SCALE_MS: f64 = 1000.0;

/// One way of reaching the logical endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable identifier, used in logs and metric keys.
    fn name(&self) -> &str;

    /// Issues one request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the attempt fails.
    async fn request(&self, operation: &str, params: &Value) -> Result<Value, TransportError>;
}

/// Routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Success rate at or below which a sufficiently-sampled transport is
    /// excluded (default: 0.05).
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,

    /// Samples required before a transport can be excluded (default: 3).
    /// Under-sampled transports are always eligible.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Maximum attempts per request; unbounded when unset.
    #[serde(default)]
    pub max_attempts: Option<usize>,

    /// Metric sample time-to-live in seconds (default: 1800).
    #[serde(default = "default_sample_ttl_seconds")]
    pub sample_ttl_seconds: u64,
}

fn default_min_success_rate() -> f64 {
    0.05
}
fn default_min_samples() -> usize {
    3
}
fn default_sample_ttl_seconds() -> u64 {
    1800
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_success_rate: default_min_success_rate(),
            min_samples: default_min_samples(),
            max_attempts: None,
            sample_ttl_seconds: default_sample_ttl_seconds(),
        }
    }
}

impl RouterConfig {
    /// Validates the configuration eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] on out-of-range values.
    pub fn validate(&self) -> Result<(), RouterConfigError> {
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(RouterConfigError::InvalidSuccessRate(self.min_success_rate));
        }
        if self.sample_ttl_seconds == 0 {
            return Err(RouterConfigError::ZeroSampleTtl);
        }
        Ok(())
    }

    fn sample_ttl(&self) -> Duration {
        Duration::from_secs(self.sample_ttl_seconds)
    }
}

/// Observability snapshot for one transport on one operation.
#[derive(Debug, Clone, Serialize)]
pub struct TransportScore {
    pub name: String,
    pub samples: usize,
    pub success_rate: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub score: f64,
    pub eligible: bool,
}

struct WindowStats {
    samples: usize,
    success_rate: Option<f64>,
    avg_latency_ms: Option<f64>,
}

/// Chooses among interchangeable transports using rolling metrics.
pub struct AdaptiveRouter {
    transports: Vec<Arc<dyn Transport>>,
    config: ArcSwap<RouterConfig>,
    windows: DashMap<(String, String), MetricWindow>,
}

impl AdaptiveRouter {
    /// Creates a router over an ordered transport list. List order breaks
    /// score ties.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] on invalid configuration.
    pub fn new(
        transports: Vec<Arc<dyn Transport>>,
        config: RouterConfig,
    ) -> Result<Self, RouterConfigError> {
        config.validate()?;
        Ok(Self { transports, config: ArcSwap::from_pointee(config), windows: DashMap::new() })
    }

    /// Swaps the routing configuration at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RouterConfigError`] on invalid configuration; the current
    /// configuration stays in place.
    pub fn update_config(&self, config: RouterConfig) -> Result<(), RouterConfigError> {
        config.validate()?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Issues `operation` on the best-scored transport, retrying on the
    /// next-best after each failure.
    ///
    /// Every attempt's outcome is recorded in that transport's metric
    /// window regardless of result. A failing transport is dropped from
    /// this request's candidate set only; its history is untouched.
    ///
    /// # Errors
    ///
    /// Returns the *first* failure encountered when every attempt failed,
    /// or [`RouterError::NoEligibleTransports`] when no attempt could be
    /// issued at all.
    pub async fn request(&self, operation: &str, params: &Value) -> Result<Value, RouterError> {
        let config = self.config.load_full();
        let mut candidates: Vec<usize> = (0..self.transports.len()).collect();
        let mut first_failure: Option<TransportError> = None;
        let mut attempts = 0usize;

        while !candidates.is_empty() {
            let Some(position) = self.select(operation, &candidates, &config) else {
                break;
            };
            let index = candidates[position];
            let transport = &self.transports[index];

            let started = Instant::now();
            let result = transport.request(operation, params).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.record_attempt(transport.name(), operation, result.is_ok(), elapsed_ms);

            match result {
                Ok(value) => {
                    debug!(
                        transport = %transport.name(),
                        operation,
                        elapsed_ms,
                        "routed request succeeded"
                    );
                    return Ok(value);
                }
                Err(error) => {
                    warn!(
                        transport = %transport.name(),
                        operation,
                        error = %error,
                        "transport attempt failed, re-scoring remaining candidates"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(error);
                    }
                    candidates.remove(position);
                    attempts += 1;
                    if config.max_attempts.is_some_and(|max| attempts >= max) {
                        break;
                    }
                }
            }
        }

        match first_failure {
            Some(error) => Err(RouterError::Transport(error)),
            None => Err(RouterError::NoEligibleTransports { operation: operation.to_string() }),
        }
    }

    /// Per-transport scores for one operation, for observability.
    #[must_use]
    pub fn snapshot(&self, operation: &str) -> Vec<TransportScore> {
        let config = self.config.load_full();
        self.transports
            .iter()
            .map(|transport| {
                let stats = self.window_stats(transport.name(), operation, &config);
                TransportScore {
                    name: transport.name().to_string(),
                    samples: stats.samples,
                    success_rate: stats.success_rate,
                    avg_latency_ms: stats.avg_latency_ms,
                    score: Self::score(&stats),
                    eligible: Self::eligible(&stats, &config),
                }
            })
            .collect()
    }

    /// Picks the best-scored eligible candidate; returns its position in
    /// `candidates`. Strict comparison keeps the earliest on ties. When the
    /// exclusion floor filters out every remaining candidate, they are
    /// re-scored without the filter: an excluded transport is still used
    /// once it is the only option left.
    fn select(&self, operation: &str, candidates: &[usize], config: &RouterConfig) -> Option<usize> {
        self.best_candidate(operation, candidates, config, true)
            .or_else(|| self.best_candidate(operation, candidates, config, false))
    }

    fn best_candidate(
        &self,
        operation: &str,
        candidates: &[usize],
        config: &RouterConfig,
        filter_excluded: bool,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (position, &index) in candidates.iter().enumerate() {
            let stats = self.window_stats(self.transports[index].name(), operation, config);
            if filter_excluded && !Self::eligible(&stats, config) {
                continue;
            }
            let score = Self::score(&stats);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((position, score));
            }
        }
        best.map(|(position, _)| position)
    }

    /// A transport is excluded only with enough samples *and* a success
    /// rate at or below the floor; an unsampled transport carries no
    /// penalty.
    fn eligible(stats: &WindowStats, config: &RouterConfig) -> bool {
        let success_rate = stats.success_rate.unwrap_or(1.0);
        !(stats.samples >= config.min_samples && success_rate <= config.min_success_rate)
    }

    fn score(stats: &WindowStats) -> f64 {
        let success_rate = stats.success_rate.unwrap_or(1.0);
        let avg_latency_ms = stats.avg_latency_ms.unwrap_or(0.0);
        SUCCESS_WEIGHT * success_rate + LATENCY_WEIGHT * (1.0 - avg_latency_ms / LATENCY_SCALE_MS)
    }

    fn window_stats(&self, transport: &str, operation: &str, config: &RouterConfig) -> WindowStats {
        let key = (transport.to_string(), operation.to_string());
        match self.windows.get_mut(&key) {
            Some(mut window) => {
                if let Some(cutoff) = Instant::now().checked_sub(config.sample_ttl()) {
                    window.prune(cutoff);
                }
                WindowStats {
                    samples: window.len(),
                    success_rate: window.success_rate(),
                    avg_latency_ms: window.avg_latency_ms(),
                }
            }
            None => WindowStats { samples: 0, success_rate: None, avg_latency_ms: None },
        }
    }

    fn record_attempt(&self, transport: &str, operation: &str, success: bool, latency_ms: u64) {
        let key = (transport.to_string(), operation.to_string());
        self.windows.entry(key).or_default().record(success, latency_ms, Instant::now());
    }
}
