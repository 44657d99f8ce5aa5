//! # Heap-Backed LFU Cache
//!
//! Least-frequently-used eviction on top of [`PriorityHeap`]. Each entry is a
//! [`FrequencyItem`] whose priority is its access count; the key index maps
//! straight to the item's [`SlotId`], and the item's cached heap index is what
//! makes bumps and deletes O(log n).
//!
//! ## Architecture
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        heap: PriorityHeap<FrequencyItem<K, V>>
//!   ┌─────────┬────────┐
//!   │ page_1  │  s0    │───────┐                   (1, page_2)   ← pop_min
//!   │ page_2  │  s1    │───┐   │                  /           \
//!   │ page_3  │  s2    │─┐ │   └──────────► (15, page_1)   (7, page_3)
//!   └─────────┴────────┘ │ └──────────────────────┘               │
//!                        └────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation    | Effect                                                 |
//! |--------------|--------------------------------------------------------|
//! | `get` hit    | count + 1, `fix(index)`                                |
//! | `set` hit    | replace value, count + 1, `fix(index)`                 |
//! | `set` new    | if full `pop_min` + `Eviction`; push with count 1      |
//! | `delete`     | `remove(index)`                                        |
//!
//! ## Tie Breaking
//!
//! Entries with equal counts are ordered only by heap structure. Which of two
//! count-1 entries is evicted first depends on the insertion and access
//! history, not on a sequence number.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{FrequencyItem, HeapItem, PriorityHeap, SlotId};
use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Bounded cache that evicts the least frequently accessed key.
///
/// # Example
///
/// ```
/// use stratacache::policy::lfu::LfuCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = LfuCache::new(2);
/// cache.set("hot", 1).unwrap();
/// cache.set("cold", 2).unwrap();
/// cache.get(&"hot").unwrap();
///
/// cache.set("new", 3).unwrap();
/// assert!(cache.get(&"cold").is_err());
/// assert_eq!(cache.frequency(&"hot"), Some(2));
/// ```
pub struct LfuCache<K, V> {
    index: FxHashMap<K, SlotId>,
    heap: PriorityHeap<FrequencyItem<K, V>>,
    capacity: usize,
    events: EventBus<K, V>,
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries (0 is treated as 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            heap: PriorityHeap::with_capacity(capacity),
            capacity,
            events: EventBus::new(),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Current access count for `key`.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let &id = self.index.get(key)?;
        self.heap.get(id).map(HeapItem::priority)
    }

    /// The entry `set` would evict next, without changing its count.
    pub fn peek_lfu(&self) -> Option<(&K, &V)> {
        self.heap.peek().map(|item| (item.key(), item.value()))
    }

    /// Increments the count of the item behind `id` and restores heap order.
    fn bump(&mut self, id: SlotId) -> Option<&FrequencyItem<K, V>> {
        let item = self.heap.get_mut(id)?;
        let index = item.index();
        item.set_priority(item.priority().saturating_add(1));
        self.heap.fix(index);
        self.heap.get(id)
    }

    fn evict_lfu(&mut self) {
        if let Some(item) = self.heap.pop_min() {
            let (key, value) = item.into_entry();
            self.index.remove(&key);
            self.events.emit(&Event::eviction(key, value));
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.index.len(), self.heap.len());
        assert!(self.index.len() <= self.capacity);
        for (key, &id) in &self.index {
            let item = self.heap.get(id).expect("indexed heap item missing");
            assert!(item.key() == key, "index points at wrong item");
            assert!(item.priority() >= 1, "count below initial value");
        }
        self.heap.debug_validate_invariants();
    }
}

impl<K, V> Cache<K, V> for LfuCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let &id = self.index.get(key).ok_or(CacheError::NotFound)?;
        self.bump(id)
            .map(|item| item.value().clone())
            .ok_or(CacheError::NotFound)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        if let Some(&id) = self.index.get(&key) {
            if let Some(item) = self.heap.get_mut(id) {
                item.set_value(value);
            }
            self.bump(id);
            return Ok(());
        }

        if self.index.len() >= self.capacity {
            self.evict_lfu();
        }
        let id = self.heap.push(FrequencyItem::new(key.clone(), value, 1));
        self.index.insert(key, id);
        Ok(())
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        let id = self.index.remove(key).ok_or(CacheError::NotFound)?;
        if let Some(index) = self.heap.get(id).map(HeapItem::index) {
            self.heap.remove(index);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.index.clear();
        self.heap.clear();
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> IterableCache<K, V> for LfuCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Visits entries in heap-array order, not by frequency.
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for item in self.heap.iter() {
            if !visit(item.key(), item.value()) {
                break;
            }
        }
    }
}

impl<K, V> ObservableCache<K, V> for LfuCache<K, V> {
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }
}

impl<K, V> fmt::Debug for LfuCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCache")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: heap order and index consistency survive random traffic.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_heap_invariants_under_traffic(
            capacity in 1usize..12,
            ops in prop::collection::vec((0u8..3, 0u8..24), 0..300)
        ) {
            let mut cache = LfuCache::new(capacity);
            for (op, key) in ops {
                match op {
                    0 => cache.set(key, u32::from(key)).unwrap(),
                    1 => { let _ = cache.get(&key); }
                    _ => { let _ = cache.delete(&key); }
                }
                prop_assert!(cache.len() <= capacity);
                cache.debug_validate_invariants();
            }
        }
    }
}
