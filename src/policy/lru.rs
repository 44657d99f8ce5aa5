//! Least-recently-used eviction.
//!
//! ```text
//!   map: FxHashMap<K, SlotId>          order: IntrusiveList<(K, V)>
//!
//!   head ─► [b,2] ◄──► [c,3] ◄──► [a,1] ◄── tail
//!           LRU                     MRU
//!      (next eviction)      (get/set move entries here)
//! ```
//!
//! | Operation | Effect on order                         |
//! |-----------|-----------------------------------------|
//! | `get` hit | move to tail                            |
//! | `set` hit | replace value, move to tail             |
//! | `set` new | evict head if full, append at tail      |
//! | `range`   | none (visits LRU → MRU)                 |

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Bounded cache that evicts the least recently accessed key.
///
/// # Example
///
/// ```
/// use stratacache::policy::lru::LruCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = LruCache::new(2);
/// cache.set("a", 1).unwrap();
/// cache.set("b", 2).unwrap();
/// cache.get(&"a").unwrap();
/// cache.set("c", 3).unwrap();
///
/// assert!(cache.get(&"b").is_err());
/// assert_eq!(cache.get(&"a").unwrap(), 1);
/// ```
pub struct LruCache<K, V> {
    map: FxHashMap<K, SlotId>,
    order: IntrusiveList<(K, V)>,
    capacity: usize,
    events: EventBus<K, V>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries (0 is treated as 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            order: IntrusiveList::with_capacity(capacity),
            capacity,
            events: EventBus::new(),
        }
    }

    /// Checks membership without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// The least recently used entry, without touching recency.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.order.front().map(|(k, v)| (k, v))
    }

    /// Marks `key` as most recently used; `false` if absent.
    pub fn touch(&mut self, key: &K) -> bool {
        match self.map.get(key) {
            Some(&id) => self.order.move_to_back(id),
            None => false,
        }
    }

    fn evict_lru(&mut self) {
        if let Some((key, value)) = self.order.pop_front() {
            self.map.remove(&key);
            self.events.emit(&Event::eviction(key, value));
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.map.len(), self.order.len());
        assert!(self.map.len() <= self.capacity);
        for (key, &id) in &self.map {
            let (node_key, _) = self.order.get(id).expect("indexed node missing");
            assert!(node_key == key, "index points at wrong node");
        }
        self.order.debug_validate_invariants();
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let &id = self.map.get(key).ok_or(CacheError::NotFound)?;
        self.order.move_to_back(id);
        self.order
            .get(id)
            .map(|(_, v)| v.clone())
            .ok_or(CacheError::NotFound)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        if let Some(&id) = self.map.get(&key) {
            if let Some(entry) = self.order.get_mut(id) {
                entry.1 = value;
            }
            self.order.move_to_back(id);
            return Ok(());
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }
        let id = self.order.push_back((key.clone(), value));
        self.map.insert(key, id);
        Ok(())
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        let id = self.map.remove(key).ok_or(CacheError::NotFound)?;
        self.order.remove(id);
        Ok(())
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> IterableCache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.order.iter() {
            if !visit(k, v) {
                break;
            }
        }
    }
}

impl<K, V> ObservableCache<K, V> for LruCache<K, V> {
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.order.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: size never exceeds capacity and map/list stay in sync.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_len_within_capacity(
            capacity in 1usize..16,
            ops in prop::collection::vec((any::<bool>(), 0u8..32), 0..300)
        ) {
            let mut cache = LruCache::new(capacity);
            for (is_set, key) in ops {
                if is_set {
                    cache.set(key, key).unwrap();
                } else {
                    let _ = cache.get(&key);
                }
                prop_assert!(cache.len() <= capacity);
            }
            cache.debug_validate_invariants();
        }
    }
}
