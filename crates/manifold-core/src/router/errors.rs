//! Transport and routing errors.

use thiserror::Error;

/// Failure of a single transport attempt.
///
/// `Clone` so the first failure of a request can be retained while later
/// attempts run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The transport's own deadline expired.
    #[error("request timed out")]
    Timeout,

    /// The endpoint could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint answered with an error of its own.
    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    /// The endpoint's answer could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of a routed request as a whole.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RouterError {
    /// Zero transports were eligible. A configuration problem, not a
    /// transient failure.
    #[error("no eligible transports for operation {operation}")]
    NoEligibleTransports { operation: String },

    /// Every attempt failed; this is the first failure encountered.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid router configuration detected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterConfigError {
    #[error("min_success_rate must be within [0, 1], got {0}")]
    InvalidSuccessRate(f64),

    #[error("sample_ttl_seconds must be greater than zero")]
    ZeroSampleTtl,
}
