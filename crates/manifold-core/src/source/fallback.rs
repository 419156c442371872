//! Priority-ordered composition: sources are tried strictly in list order
//! until the merged answers are complete.

use super::{
    capability::CapabilityMap,
    errors::SourceError,
    types::{Query, ResponseMap},
    Source,
};
use crate::task::{shave, with_timeout};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Awaits eligible sources one at a time, in list order, merging after each
/// response and stopping early once every requested pair is answered.
///
/// A failing or timed-out source is skipped, not surfaced; the combinator
/// returns whatever accumulated. The only hard failure is an empty
/// eligible set.
pub struct FallbackSource<V> {
    name: String,
    sources: Vec<Arc<dyn Source<V>>>,
    capabilities: CapabilityMap,
}

impl<V> FallbackSource<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: impl Into<String>, sources: Vec<Arc<dyn Source<V>>>) -> Self {
        let capabilities = CapabilityMap::union(sources.iter().map(|source| source.capabilities()));
        Self { name: name.into(), sources, capabilities }
    }
}

#[async_trait]
impl<V> Source<V> for FallbackSource<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    async fn fetch(
        &self,
        query: &Query,
        timeout: Option<Duration>,
    ) -> Result<ResponseMap<V>, SourceError> {
        let eligible: Vec<(&Arc<dyn Source<V>>, Query)> = self
            .sources
            .iter()
            .filter_map(|source| {
                let scoped = source.capabilities().restrict(query);
                (!scoped.is_empty()).then_some((source, scoped))
            })
            .collect();

        if eligible.is_empty() {
            return Err(SourceError::NoEligibleSources);
        }

        let inner_timeout = shave(timeout);
        let mut merged = ResponseMap::new();
        for (source, scoped) in eligible {
            let description = format!("source {}", source.name());
            match with_timeout(&description, timeout, source.fetch(&scoped, inner_timeout)).await {
                Ok(Ok(response)) => {
                    merged.merge_preserving(response);
                    if merged.covers(query) {
                        break;
                    }
                }
                Ok(Err(error)) => {
                    warn!(source = %source.name(), error = %error, "fallback source failed, trying next");
                }
                Err(expired) => {
                    warn!(source = %source.name(), error = %expired, "fallback source timed out, trying next");
                }
            }
        }

        Ok(merged)
    }
}
