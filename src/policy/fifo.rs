//! First-in, first-out eviction.
//!
//! ```text
//!   map: FxHashMap<K, SlotId>          order: IntrusiveList<(K, V)>
//!
//!   head ─► [a,1] ◄──► [b,2] ◄──► [c,3] ◄── tail
//!          oldest                   newest
//!          (next eviction)          (new keys append here)
//! ```
//!
//! Re-setting an existing key replaces its value in place; its arrival
//! position does not change. Reads never reorder.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Bounded cache that evicts the earliest-inserted key.
///
/// # Example
///
/// ```
/// use stratacache::policy::fifo::FifoCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = FifoCache::new(2);
/// cache.set("a", 1).unwrap();
/// cache.set("b", 2).unwrap();
/// cache.get(&"a").unwrap(); // reads do not refresh
/// cache.set("c", 3).unwrap();
///
/// assert!(cache.get(&"a").is_err());
/// assert_eq!(cache.get(&"b").unwrap(), 2);
/// ```
pub struct FifoCache<K, V> {
    map: FxHashMap<K, SlotId>,
    order: IntrusiveList<(K, V)>,
    capacity: usize,
    events: EventBus<K, V>,
}

impl<K, V> FifoCache<K, V>
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

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// The entry that would be evicted next.
    pub fn peek_oldest(&self) -> Option<(&K, &V)> {
        self.order.front().map(|(k, v)| (k, v))
    }

    fn evict_oldest(&mut self) {
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

impl<K, V> Cache<K, V> for FifoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let &id = self.map.get(key).ok_or(CacheError::NotFound)?;
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
            return Ok(());
        }

        if self.map.len() >= self.capacity {
            self.evict_oldest();
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

impl<K, V> IterableCache<K, V> for FifoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Visits entries oldest first.
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.order.iter() {
            if !visit(k, v) {
                break;
            }
        }
    }
}

impl<K, V> ObservableCache<K, V> for FifoCache<K, V> {
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }
}

impl<K, V> fmt::Debug for FifoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoCache")
            .field("len", &self.order.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
