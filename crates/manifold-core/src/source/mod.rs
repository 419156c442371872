//! Sources and the combinators that compose them.
//!
//! A [`Source`] is a stateless collaborator that declares which
//! `(partition, field)` pairs it can answer and fetches a scoped subset of
//! them. The combinators — [`RacingSource`], [`FallbackSource`], and
//! [`AggregatingSource`] — each compose an ordered list of sources into one
//! logical source, and implement [`Source`] themselves so strategies can be
//! layered.

pub mod aggregate;
pub mod capability;
pub mod errors;
pub mod fallback;
pub mod race;
pub mod types;

pub use aggregate::{AggregatingSource, AggregationMethod};
pub use capability::{CapabilityMap, Support};
pub use errors::SourceError;
pub use fallback::FallbackSource;
pub use race::RacingSource;
pub use types::{Datum, Field, Partition, Query, ResponseMap};

use async_trait::async_trait;
use std::time::Duration;

/// A stateless producer of answers for some subset of a query.
///
/// The core never mutates a source; concrete implementations are typically
/// one-per-provider adapters living in the embedding application.
#[async_trait]
pub trait Source<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Human-readable identifier, used in logs.
    fn name(&self) -> &str;

    /// The `(partition, field)` pairs this source can answer.
    fn capabilities(&self) -> &CapabilityMap;

    /// Fetches answers for a query already scoped to this source's
    /// capabilities.
    ///
    /// A pair absent from the response is not an error. `timeout` is
    /// advisory; callers additionally enforce their own deadline.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the fetch as a whole fails.
    async fn fetch(
        &self,
        query: &Query,
        timeout: Option<Duration>,
    ) -> Result<ResponseMap<V>, SourceError>;
}
