//! Query and response shapes shared by every source.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Grouping key under which source support and request scopes are
/// organized, e.g. a network id.
pub type Partition = u64;

/// Opaque name of one requested unit of data within a partition.
pub type Field = String;

/// A request scoped by partition: which fields are wanted where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    scopes: BTreeMap<Partition, BTreeSet<Field>>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form: adds `fields` to `partition`'s scope.
    #[must_use]
    pub fn with_fields<I, S>(mut self, partition: Partition, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Field>,
    {
        let scope = self.scopes.entry(partition).or_default();
        scope.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn insert(&mut self, partition: Partition, field: Field) {
        self.scopes.entry(partition).or_default().insert(field);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(BTreeSet::is_empty)
    }

    /// Every requested `(partition, field)` pair.
    pub fn pairs(&self) -> impl Iterator<Item = (Partition, &Field)> {
        self.scopes
            .iter()
            .flat_map(|(partition, fields)| fields.iter().map(move |field| (*partition, field)))
    }

    #[must_use]
    pub fn fields(&self, partition: Partition) -> Option<&BTreeSet<Field>> {
        self.scopes.get(&partition)
    }

    #[must_use]
    pub fn contains(&self, partition: Partition, field: &str) -> bool {
        self.scopes.get(&partition).is_some_and(|fields| fields.contains(field))
    }

    /// Number of requested `(partition, field)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.values().map(BTreeSet::len).sum()
    }
}

/// Per-source answers, keyed by partition then field.
///
/// Merging never overwrites an already-answered pair, so earlier (or
/// faster) sources keep their answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMap<V> {
    partitions: BTreeMap<Partition, BTreeMap<Field, V>>,
}

impl<V> Default for ResponseMap<V> {
    fn default() -> Self {
        Self { partitions: BTreeMap::new() }
    }
}

impl<V> ResponseMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, partition: Partition, field: Field, value: V) {
        self.partitions.entry(partition).or_default().insert(field, value);
    }

    #[must_use]
    pub fn get(&self, partition: Partition, field: &str) -> Option<&V> {
        self.partitions.get(&partition)?.get(field)
    }

    /// Merges `other` in, keeping any pair this map already answered.
    pub fn merge_preserving(&mut self, other: ResponseMap<V>) {
        for (partition, fields) in other.partitions {
            let target = self.partitions.entry(partition).or_default();
            for (field, value) in fields {
                target.entry(field).or_insert(value);
            }
        }
    }

    /// Whether every pair the query asks for has an answer.
    #[must_use]
    pub fn covers(&self, query: &Query) -> bool {
        query.pairs().all(|(partition, field)| {
            self.partitions.get(&partition).is_some_and(|fields| fields.contains_key(field))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Partition, &Field, &V)> {
        self.partitions
            .iter()
            .flat_map(|(partition, fields)| fields.iter().map(move |(f, v)| (*partition, f, v)))
    }

    /// Number of answered `(partition, field)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A numeric answer in one of two mutually-exclusive shapes.
///
/// The shape is decided once when the response is decoded, never inferred
/// field-by-field downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Datum {
    /// A single consolidated number.
    Single { value: f64 },
    /// A two-sided quote.
    Split { buy: f64, sell: f64 },
}

impl Datum {
    #[must_use]
    pub fn single(value: f64) -> Self {
        Self::Single { value }
    }

    #[must_use]
    pub fn split(buy: f64, sell: f64) -> Self {
        Self::Split { buy, sell }
    }
}
