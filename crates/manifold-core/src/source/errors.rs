//! Source and combinator errors.
//!
//! Individual source failures inside a combinator are recovered locally and
//! never surfaced on their own; only an empty eligible set or total
//! exhaustion reaches the caller.

use crate::task::TimeoutError;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SourceError {
    /// Zero sources are eligible for the requested scope. A configuration
    /// problem, not a transient failure.
    #[error("no eligible sources for the requested scope")]
    NoEligibleSources,

    /// Every eligible source failed, timed out, or answered nothing.
    #[error("no source produced a usable response")]
    Exhausted,

    /// The source exceeded its deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The source reported a failure of its own.
    #[error("source failed: {0}")]
    Failed(String),
}
