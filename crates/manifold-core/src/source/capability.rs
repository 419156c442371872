//! Runtime capability maps: what each source can answer, per partition.
//!
//! Combinators build their own capability map by explicit union over their
//! source list at construction time, so "what this stack of sources
//! supports" is an ordinary runtime value.

use super::types::{Field, Partition, Query};
use std::collections::BTreeMap;

/// How strongly a source supports a field.
///
/// Ordered so that `Required` wins when capability maps are unioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Support {
    Optional,
    Required,
}

/// Partition → field → support level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap {
    partitions: BTreeMap<Partition, BTreeMap<Field, Support>>,
}

impl CapabilityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form: declares support for one field in one partition.
    #[must_use]
    pub fn declare(mut self, partition: Partition, field: impl Into<Field>, support: Support) -> Self {
        self.partitions.entry(partition).or_default().insert(field.into(), support);
        self
    }

    #[must_use]
    pub fn support(&self, partition: Partition, field: &str) -> Option<Support> {
        self.partitions.get(&partition)?.get(field).copied()
    }

    #[must_use]
    pub fn supports(&self, partition: Partition, field: &str) -> bool {
        self.support(partition, field).is_some()
    }

    #[must_use]
    pub fn supports_partition(&self, partition: Partition) -> bool {
        self.partitions.get(&partition).is_some_and(|fields| !fields.is_empty())
    }

    /// Unions capability maps; the strongest support level per pair wins.
    #[must_use]
    pub fn union<'a>(maps: impl IntoIterator<Item = &'a CapabilityMap>) -> CapabilityMap {
        let mut merged = CapabilityMap::new();
        for map in maps {
            for (partition, fields) in &map.partitions {
                let target = merged.partitions.entry(*partition).or_default();
                for (field, support) in fields {
                    target
                        .entry(field.clone())
                        .and_modify(|existing| *existing = (*existing).max(*support))
                        .or_insert(*support);
                }
            }
        }
        merged
    }

    /// The sub-query this map can answer. Empty means ineligible.
    #[must_use]
    pub fn restrict(&self, query: &Query) -> Query {
        let mut restricted = Query::new();
        for (partition, field) in query.pairs() {
            if self.supports(partition, field) {
                restricted.insert(partition, field.clone());
            }
        }
        restricted
    }

    #[must_use]
    pub fn is_eligible_for(&self, query: &Query) -> bool {
        !self.restrict(query).is_empty()
    }
}
