//! Deadline wrapping for async operations.
//!
//! [`with_timeout`] races an operation against a timer and converts expiry
//! into a [`TimeoutError`] that callers can always tell apart from a domain
//! failure. With no duration configured the operation passes through
//! unchanged.

use std::{future::Future, time::Duration};
use thiserror::Error;

/// Margin shaved off a propagated outer deadline before handing it to an
/// inner operation, so the outer bookkeeping has room to run after the
/// inner one gives up.
pub const INNER_TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

/// Floor for a shaved deadline. A propagated timeout never drops below this.
const MIN_INNER_TIMEOUT: Duration = Duration::from_millis(10);

/// A bounded operation exceeded its deadline.
///
/// Carries the human-readable description of the operation and the
/// configured duration so logs and upstream errors stay diagnosable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description} timed out after {duration:?}")]
pub struct TimeoutError {
    pub description: String,
    pub duration: Duration,
}

/// Races `operation` against `timeout`.
///
/// `None` passes the operation through unchanged. On expiry the late result
/// is abandoned, not cancelled: interest is dropped locally and whatever the
/// operation was doing runs to completion in the background.
///
/// # Errors
///
/// Returns [`TimeoutError`] when the timer fires first.
pub async fn with_timeout<F, T>(
    description: &str,
    timeout: Option<Duration>,
    operation: F,
) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    match timeout {
        None => Ok(operation.await),
        Some(duration) => match tokio::time::timeout(duration, operation).await {
            Ok(value) => Ok(value),
            Err(_) => Err(TimeoutError { description: description.to_string(), duration }),
        },
    }
}

/// Shaves [`INNER_TIMEOUT_MARGIN`] off an outer deadline before it is
/// propagated inward, flooring at a small minimum.
#[must_use]
pub fn shave(outer: Option<Duration>) -> Option<Duration> {
    outer.map(|duration| duration.saturating_sub(INNER_TIMEOUT_MARGIN).max(MIN_INNER_TIMEOUT))
}
