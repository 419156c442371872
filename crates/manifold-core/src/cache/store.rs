//! Bounded LRU storage for cache entries.
//!
//! Plain single-owner data structure; the cache wraps it in a mutex. Access
//! refreshes recency, so a repeatedly-read entry survives insertion
//! pressure from colder keys.

use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

/// A stored value and the moment it was last written.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub last_updated_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Age of the entry relative to `now`.
    #[must_use]
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_updated_at)
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    stamp: u64,
}

/// Bounded store with least-recently-used eviction.
///
/// Recency is tracked with a monotonic stamp per slot and a stamp-ordered
/// index, so eviction and touch are both logarithmic.
pub struct LruStore<V> {
    max_entries: usize,
    slots: HashMap<String, Slot<V>>,
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl<V> LruStore<V> {
    /// Creates a store bounded at `max_entries` (> 0, validated by the
    /// owning cache's configuration).
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries, slots: HashMap::new(), recency: BTreeMap::new(), clock: 0 }
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Reads an entry and refreshes its recency.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let stamp = self.next_stamp();
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.stamp);
        slot.stamp = stamp;
        self.recency.insert(stamp, key.to_string());
        Some(&slot.entry)
    }

    /// Reads an entry without touching recency. Used by freshness probes so
    /// a probe never changes eviction order.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.slots.get(key).map(|slot| &slot.entry)
    }

    /// Writes an entry, evicting the least-recently-used slot when the
    /// store is full. Returns the evicted key, if any.
    pub fn insert(&mut self, key: String, value: V, now: Instant) -> Option<String> {
        let stamp = self.next_stamp();
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.entry = CacheEntry { value, last_updated_at: now };
            self.recency.remove(&slot.stamp);
            slot.stamp = stamp;
            self.recency.insert(stamp, key);
            return None;
        }

        let evicted = if self.slots.len() >= self.max_entries {
            self.evict_lru()
        } else {
            None
        };

        self.slots.insert(key.clone(), Slot { entry: CacheEntry { value, last_updated_at: now }, stamp });
        self.recency.insert(stamp, key);
        evicted
    }

    /// Removes an entry, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.recency.remove(&slot.stamp);
                true
            }
            None => false,
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (&stamp, _) = self.recency.iter().next()?;
        let key = self.recency.remove(&stamp)?;
        self.slots.remove(&key);
        Some(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
