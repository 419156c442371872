//! Numeric aggregation across redundant sources.
//!
//! Every eligible source is queried concurrently within one shared timeout;
//! failing or timed-out sources are silently dropped. Surviving answers are
//! grouped per `(partition, field)` pair and reduced with the configured
//! [`AggregationMethod`]. When a pair arrives in both [`Datum`] shapes, the
//! shape reported by the most sources wins (ties favor the richer `Split`
//! shape) and each numeric component is reduced independently within that
//! shape only.

use super::{
    capability::CapabilityMap,
    errors::SourceError,
    types::{Datum, Field, Partition, Query, ResponseMap},
    Source,
};
use crate::task::{shave, with_timeout};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::debug;

/// How grouped numeric values collapse into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Max,
    Min,
    /// Arithmetic mean.
    Avg,
    /// The middle element of the values sorted ascending (index `len / 2`) —
    /// a deliberate middle-pick, not a statistical mean or median.
    Mean,
}

impl AggregationMethod {
    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            #[allow(clippy::cast_precision_loss)]
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Mean => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                sorted[sorted.len() / 2]
            }
        }
    }
}

/// Composes sources by reducing their numeric answers per pair.
pub struct AggregatingSource {
    name: String,
    sources: Vec<Arc<dyn Source<Datum>>>,
    capabilities: CapabilityMap,
    method: AggregationMethod,
}

impl AggregatingSource {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Arc<dyn Source<Datum>>>,
        method: AggregationMethod,
    ) -> Self {
        let capabilities = CapabilityMap::union(sources.iter().map(|source| source.capabilities()));
        Self { name: name.into(), sources, capabilities, method }
    }

    /// Reduces one pair's collected values within the winning shape family.
    fn reduce_group(method: AggregationMethod, values: &[Datum]) -> Datum {
        let singles: Vec<f64> = values
            .iter()
            .filter_map(|datum| match datum {
                Datum::Single { value } => Some(*value),
                Datum::Split { .. } => None,
            })
            .collect();
        let splits: Vec<(f64, f64)> = values
            .iter()
            .filter_map(|datum| match datum {
                Datum::Split { buy, sell } => Some((*buy, *sell)),
                Datum::Single { .. } => None,
            })
            .collect();

        if !splits.is_empty() && splits.len() >= singles.len() {
            let buys: Vec<f64> = splits.iter().map(|(buy, _)| *buy).collect();
            let sells: Vec<f64> = splits.iter().map(|(_, sell)| *sell).collect();
            Datum::Split { buy: method.reduce(&buys), sell: method.reduce(&sells) }
        } else {
            Datum::Single { value: method.reduce(&singles) }
        }
    }
}

#[async_trait]
impl Source<Datum> for AggregatingSource {
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
    ) -> Result<ResponseMap<Datum>, SourceError> {
        let eligible: Vec<(&Arc<dyn Source<Datum>>, Query)> = self
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
        let outcomes = futures::future::join_all(eligible.into_iter().map(|(source, scoped)| {
            async move {
                let name = source.name().to_string();
                let description = format!("source {name}");
                let outcome =
                    with_timeout(&description, timeout, source.fetch(&scoped, inner_timeout)).await;
                (name, outcome)
            }
        }))
        .await;

        let mut usable: Vec<ResponseMap<Datum>> = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(Ok(response)) if !response.is_empty() => usable.push(response),
                Ok(Ok(_)) => debug!(source = %name, "source answered nothing, dropping"),
                Ok(Err(error)) => {
                    debug!(source = %name, error = %error, "source failed, dropping from aggregation");
                }
                Err(expired) => {
                    debug!(source = %name, error = %expired, "source timed out, dropping from aggregation");
                }
            }
        }

        if usable.is_empty() {
            return Err(SourceError::Exhausted);
        }

        let mut groups: BTreeMap<(Partition, Field), Vec<Datum>> = BTreeMap::new();
        for response in &usable {
            for (partition, field, datum) in response.iter() {
                groups.entry((partition, field.clone())).or_default().push(*datum);
            }
        }

        let mut merged = ResponseMap::new();
        for ((partition, field), values) in groups {
            merged.insert(partition, field, Self::reduce_group(self.method, &values));
        }
        Ok(merged)
    }
}
