//! Bounded cache with cost and count limits.
//!
//! Entries are evicted strictly in insertion order (oldest first). Reading
//! an entry never changes its position; replacing an entry re-inserts it at
//! the newest end. After every mutation both limits hold:
//!
//! ```text
//! total_cost <= max_cost  &&  len <= max_elements
//! ```

use std::hash::Hash;

use lru::LruCache;
use tracing::trace;

use crate::config::CacheConfig;

/// A cached value and the cost it was charged.
///
/// The key is not repeated here; it lives in the backing [`LruCache`].
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value.
    pub value: V,

    /// Cost counted against `max_cost`.
    pub cost: usize,
}

/// Fixed-capacity insertion-ordered cache.
///
/// Backed by an unbounded [`LruCache`] used only through its non-promoting
/// operations (`peek`, `contains`, `pop`, `pop_lru`) and `put` of keys that
/// are not present, so its recency order is insertion order. Lookup and
/// oldest-entry eviction are both O(1).
///
/// Room for a new entry is made before it is inserted, so `total_cost`
/// never exceeds `max_cost` and cannot overflow.
///
/// Not synchronized; wrap it in a lock if it must be shared across threads.
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    max_cost: usize,
    max_elements: usize,
    total_cost: usize,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache with the given limits.
    #[must_use]
    pub fn new(max_cost: usize, max_elements: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_cost,
            max_elements,
            total_cost: 0,
        }
    }

    /// Create a cache from a [`CacheConfig`].
    #[must_use]
    pub fn with_config(config: &CacheConfig) -> Self {
        Self::new(config.max_cost, config.max_elements)
    }

    /// Insert or replace `key`, then evict the oldest entries until both
    /// limits hold.
    ///
    /// An entry whose own cost exceeds `max_cost` is evicted along with
    /// everything older than it.
    pub fn set(&mut self, key: K, value: V, cost: usize) {
        if let Some(previous) = self.entries.pop(&key) {
            self.total_cost -= previous.cost;
        }

        if cost > self.max_cost || self.max_elements == 0 {
            while self.evict_oldest() {}
            trace!(cost, "entry exceeds cache limits, not retained");
            return;
        }

        while self.total_cost > self.max_cost - cost || self.entries.len() >= self.max_elements {
            if !self.evict_oldest() {
                break;
            }
        }
        self.entries.put(key, CacheEntry { value, cost });
        self.total_cost += cost;
    }

    /// Look up `key` without affecting eviction order.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.peek(key).map(|entry| &entry.value)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.pop(key)?;
        self.total_cost -= entry.cost;
        Some(entry.value)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the costs of all entries.
    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    /// Configured cost limit.
    pub fn max_cost(&self) -> usize {
        self.max_cost
    }

    /// Configured count limit.
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().rev().map(|(key, _)| key)
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, entry)) = self.entries.pop_lru() else {
            return false;
        };
        self.total_cost -= entry.cost;
        trace!(
            cost = entry.cost,
            total_cost = self.total_cost,
            len = self.entries.len(),
            "evicted oldest cache entry"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(i: usize) -> String {
        format!("word{i}")
    }

    #[test]
    fn test_cost_limit_evicts_oldest() {
        let mut cache = BoundedCache::new(10, 10);
        for (i, cost) in [1, 1, 3, 5, 5].into_iter().enumerate() {
            cache.set(word(i), i, cost);
        }

        assert!(cache.get(&word(0)).is_none());
        assert!(cache.get(&word(1)).is_none());
        assert!(cache.get(&word(2)).is_none());
        assert_eq!(cache.get(&word(3)), Some(&3));
        assert_eq!(cache.get(&word(4)), Some(&4));
        assert_eq!(cache.total_cost(), 10);
    }

    #[test]
    fn test_count_limit_evicts_oldest() {
        let mut cache = BoundedCache::new(100, 10);
        for i in 0..11 {
            cache.set(word(i), i, 1);
        }

        assert!(cache.get(&word(0)).is_none());
        for i in 1..11 {
            assert_eq!(cache.get(&word(i)), Some(&i));
        }
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_get_does_not_promote() {
        let mut cache = BoundedCache::new(100, 2);
        cache.set("a", 1, 1);
        cache.set("b", 2, 1);

        assert_eq!(cache.get(&"a"), Some(&1));
        cache.set("c", 3, 1);

        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_replace_refreshes_position_and_cost() {
        let mut cache = BoundedCache::new(100, 2);
        cache.set("a", 1, 4);
        cache.set("b", 2, 1);
        cache.set("a", 10, 2);

        assert_eq!(cache.total_cost(), 3);
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec!["b", "a"]);

        cache.set("c", 3, 1);
        assert!(!cache.contains(&"b"));
        assert_eq!(cache.get(&"a"), Some(&10));
    }

    #[test]
    fn test_oversized_entry_is_not_retained() {
        let mut cache = BoundedCache::new(5, 10);
        cache.set("small", 1, 1);
        cache.set("huge", 2, 6);

        assert!(!cache.contains(&"huge"));
        assert!(!cache.contains(&"small"));
        assert!(cache.is_empty());
        assert_eq!(cache.total_cost(), 0);
    }

    #[test]
    fn test_zero_cost_entries_bounded_by_count() {
        let mut cache = BoundedCache::new(0, 3);
        for i in 0..5 {
            cache.set(i, i, 0);
        }
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_remove_and_clear_track_cost() {
        let mut cache = BoundedCache::new(10, 10);
        cache.set("a", 1, 3);
        cache.set("b", 2, 4);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.total_cost(), 4);
        assert_eq!(cache.remove(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_cost(), 0);
    }

    #[test]
    fn test_costs_near_usize_max_stay_exact() {
        let mut cache = BoundedCache::new(usize::MAX, 10);
        cache.set("a", 1, usize::MAX);
        assert_eq!(cache.total_cost(), usize::MAX);

        cache.set("b", 2, 1);
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.total_cost(), 1);

        cache.set("a", 3, 0);
        assert_eq!(cache.remove(&"b"), Some(2));
        assert_eq!(cache.total_cost(), 0);
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_zero_element_limit_keeps_nothing() {
        let mut cache = BoundedCache::new(10, 0);
        cache.set("a", 1, 1);
        assert!(cache.is_empty());
        assert_eq!(cache.total_cost(), 0);
    }
}
