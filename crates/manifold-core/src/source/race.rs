//! First-success-wins composition: every eligible source races, answers
//! merge as they land, and the first complete merge wins.

use super::{
    capability::CapabilityMap,
    errors::SourceError,
    types::{Query, ResponseMap},
    Source,
};
use crate::task::{shave, with_timeout};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::debug;

/// Races all eligible sources concurrently and resolves as soon as the
/// merged answers satisfy every requested pair.
///
/// Losing sources are left to finish in the background — their requests are
/// read-only and idempotent, so late results are simply discarded. If every
/// source settles before the merge is complete, whatever accumulated is
/// returned; the only hard failure is an empty eligible set.
pub struct RacingSource<V> {
    name: String,
    sources: Vec<Arc<dyn Source<V>>>,
    capabilities: CapabilityMap,
}

impl<V> RacingSource<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Composes `sources` under `name`; the combined capability map is the
    /// union of the sources' maps, built once here.
    #[must_use]
    pub fn new(name: impl Into<String>, sources: Vec<Arc<dyn Source<V>>>) -> Self {
        let capabilities = CapabilityMap::union(sources.iter().map(|source| source.capabilities()));
        Self { name: name.into(), sources, capabilities }
    }
}

#[async_trait]
impl<V> Source<V> for RacingSource<V>
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
        let eligible: Vec<(Arc<dyn Source<V>>, Query)> = self
            .sources
            .iter()
            .filter_map(|source| {
                let scoped = source.capabilities().restrict(query);
                (!scoped.is_empty()).then(|| (Arc::clone(source), scoped))
            })
            .collect();

        if eligible.is_empty() {
            return Err(SourceError::NoEligibleSources);
        }

        let inner_timeout = shave(timeout);
        let (tx, mut rx) = mpsc::channel(eligible.len());
        for (source, scoped) in eligible {
            let tx = tx.clone();
            tokio::spawn(async move {
                let name = source.name().to_string();
                let description = format!("source {name}");
                let outcome =
                    with_timeout(&description, timeout, source.fetch(&scoped, inner_timeout)).await;
                // Receiver may be gone if the race already resolved.
                let _ = tx.send((name, outcome)).await;
            });
        }
        drop(tx);

        let mut merged = ResponseMap::new();
        while let Some((name, outcome)) = rx.recv().await {
            match outcome {
                Ok(Ok(response)) => {
                    merged.merge_preserving(response);
                    if merged.covers(query) {
                        break;
                    }
                }
                Ok(Err(error)) => {
                    debug!(source = %name, error = %error, "source failed during race");
                }
                Err(expired) => {
                    debug!(source = %name, error = %expired, "source timed out during race");
                }
            }
        }

        Ok(merged)
    }
}
