//! Rolling success/latency windows, one per (transport, operation).

use tokio::time::Instant;

/// One recorded transport attempt.
#[derive(Debug, Clone, Copy)]
struct Sample {
    recorded_at: Instant,
    success: bool,
    latency_ms: u64,
}

/// Rolling window of recent attempts for one (transport, operation) pair.
///
/// Samples are appended after every attempt and pruned lazily on read: when
/// the oldest sample has aged past the TTL cutoff the whole window resets,
/// so a transport's history clears in one step instead of draining
/// sample-by-sample.
#[derive(Debug, Default)]
pub struct MetricWindow {
    samples: Vec<Sample>,
}

impl MetricWindow {
    /// Appends a sample for an attempt that just finished.
    pub fn record(&mut self, success: bool, latency_ms: u64, now: Instant) {
        self.samples.push(Sample { recorded_at: now, success, latency_ms });
    }

    /// Resets the window when its oldest sample predates `cutoff`.
    pub fn prune(&mut self, cutoff: Instant) {
        if self.samples.first().is_some_and(|oldest| oldest.recorded_at < cutoff) {
            self.samples.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fraction of successful attempts, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let successes = self.samples.iter().filter(|sample| sample.success).count();
        Some(successes as f64 / self.samples.len() as f64)
    }

    /// Mean latency across attempts, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: u64 = self.samples.iter().map(|sample| sample.latency_ms).sum();
        Some(total as f64 / self.samples.len() as f64)
    }
}
