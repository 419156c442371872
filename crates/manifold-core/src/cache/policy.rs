//! Expiration policy for cached values.
//!
//! A policy carries two staleness bounds: how old a cached value may be and
//! still be served without recomputation (`use_cached_value`), and how old
//! it may be and still be served when recomputation fails
//! (`use_cached_value_if_calculation_failed`). The second bound is the
//! failure-tolerance tier and must never be tighter than the first.

use std::time::Duration;
use thiserror::Error;

/// How old a cached value may be for a given purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Any age is acceptable.
    Always,
    /// Acceptable while younger than the given duration.
    Within(Duration),
}

impl Tolerance {
    /// Whether a value of the given age is acceptable under this bound.
    #[must_use]
    pub fn allows(&self, age: Duration) -> bool {
        match self {
            Self::Always => true,
            Self::Within(window) => age <= *window,
        }
    }
}

/// Invalid expiration policy detected at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The fresh window exceeds the failure-tolerant window, so a value
    /// could be "fresh" yet too old to serve on failure.
    #[error("fresh window {fresh:?} exceeds failure-tolerant window {stale:?}")]
    InvertedWindows { fresh: Duration, stale: Duration },
}

/// Two-tier stale-value policy.
///
/// Construction fails fast when both bounds are duration-limited and the
/// fresh window is wider than the failure-tolerant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    use_cached_value: Tolerance,
    use_cached_value_if_calculation_failed: Tolerance,
}

impl ExpirationPolicy {
    /// Builds a policy, validating that the fresh window does not exceed
    /// the failure-tolerant window.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvertedWindows`] when both bounds are
    /// `Within` and `fresh > stale`.
    pub fn new(fresh: Tolerance, stale_if_failed: Tolerance) -> Result<Self, PolicyError> {
        if let (Tolerance::Within(f), Tolerance::Within(s)) = (fresh, stale_if_failed) {
            if f > s {
                return Err(PolicyError::InvertedWindows { fresh: f, stale: s });
            }
        }
        Ok(Self {
            use_cached_value: fresh,
            use_cached_value_if_calculation_failed: stale_if_failed,
        })
    }

    /// Policy that serves cached values forever and never recomputes.
    #[must_use]
    pub fn always() -> Self {
        Self {
            use_cached_value: Tolerance::Always,
            use_cached_value_if_calculation_failed: Tolerance::Always,
        }
    }

    /// Whether a value of the given age is fresh enough to serve without
    /// recomputation.
    #[must_use]
    pub fn is_fresh(&self, age: Duration) -> bool {
        self.use_cached_value.allows(age)
    }

    /// Whether a value of the given age may still be served after a failed
    /// recomputation.
    #[must_use]
    pub fn is_usable_on_failure(&self, age: Duration) -> bool {
        self.use_cached_value_if_calculation_failed.allows(age)
    }

    #[must_use]
    pub fn use_cached_value(&self) -> Tolerance {
        self.use_cached_value
    }

    #[must_use]
    pub fn use_cached_value_if_calculation_failed(&self) -> Tolerance {
        self.use_cached_value_if_calculation_failed
    }
}
