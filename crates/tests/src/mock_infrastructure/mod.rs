//! Reusable scripted collaborators for exercising the orchestration core.
//!
//! Everything here counts its invocations so tests can assert *how* the
//! core reached an answer, not just what the answer was.

pub mod transports;

pub use calculators::MockCalculator;
pub use sources::MockSource;
pub use transports::MockTransport;
