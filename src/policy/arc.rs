//! Adaptive Replacement Cache (ARC).
//!
//! ARC splits resident entries into a recency list and a frequency list, and
//! remembers the keys it recently evicted from each. Hits on those remembered
//! keys move the target split `p` toward whichever side was evicted too
//! eagerly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ArcCache<K, V>                                │
//! │                                                                         │
//! │   index: FxHashMap<K, (Segment, SlotId)>                                │
//! │                                                                         │
//! │   T1 (seen once)                       T2 (seen twice or more)          │
//! │   ┌─────────────────────────┐          ┌─────────────────────────┐      │
//! │   │ MRU               LRU   │          │ MRU               LRU   │      │
//! │   │ [k,v] ◄──► [k,v] ◄──► ──┼─► B1     │ [k,v] ◄──► [k,v] ◄──► ──┼─► B2 │
//! │   └─────────────────────────┘          └─────────────────────────┘      │
//! │                                                                         │
//! │   B1 / B2: GhostList<K>, keys only, each bounded to `capacity`          │
//! │   p: target size of T1, 0 ≤ p ≤ capacity, starts at 0                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//!
//! | Where the key is | `get`                 | `set`                                      |
//! |------------------|-----------------------|--------------------------------------------|
//! | T1               | move to T2 MRU        | replace value, move to T2 MRU              |
//! | T2               | move to T2 MRU        | replace value, move to T2 MRU              |
//! | B1               | `NotFound`            | p += max(1, ⌊B2/B1⌋); replace; insert T2   |
//! | B2               | `NotFound`            | p -= max(1, ⌊B1/B2⌋); replace; insert T2   |
//! | nowhere          | `NotFound`            | replace if full; insert T1 MRU             |
//!
//! `replace` runs only when `|T1| + |T2| == capacity`:
//!
//! ```text
//!   if |T1| > 0 and (|T1| > p or (from_b1 and |T1| == p)):
//!       evict T1 LRU → record key in B1
//!   else:
//!       evict T2 LRU → record key in B2    (falls back to T1 if T2 is empty)
//! ```
//!
//! Each eviction emits one `Eviction` event. `range` covers T1 then T2, MRU
//! first; ghost keys have no values and are never visited.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{GhostList, IntrusiveList, SlotId};
use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    T1,
    T2,
}

/// Self-tuning cache balancing recency against frequency.
///
/// # Example
///
/// ```
/// use stratacache::policy::arc::ArcCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = ArcCache::new(2);
/// cache.set("a", 1).unwrap();
/// cache.set("b", 2).unwrap();
/// cache.set("c", 3).unwrap(); // evicts "a" into B1
///
/// assert_eq!(cache.b1_len(), 1);
/// cache.set("a", 10).unwrap(); // ghost hit: p grows, "a" lands in T2
/// assert_eq!(cache.p_value(), 1);
/// assert_eq!(cache.get(&"a").unwrap(), 10);
/// ```
pub struct ArcCache<K, V> {
    index: FxHashMap<K, (Segment, SlotId)>,
    t1: IntrusiveList<(K, V)>,
    t2: IntrusiveList<(K, V)>,
    b1: GhostList<K>,
    b2: GhostList<K>,
    p: usize,
    capacity: usize,
    events: EventBus<K, V>,
}

impl<K, V> ArcCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries (0 is treated as 1).
    /// Each ghost list is bounded to the same capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            t1: IntrusiveList::with_capacity(capacity),
            t2: IntrusiveList::with_capacity(capacity),
            b1: GhostList::new(capacity),
            b2: GhostList::new(capacity),
            p: 0,
            capacity,
            events: EventBus::new(),
        }
    }

    /// Current target size of T1.
    pub fn p_value(&self) -> usize {
        self.p
    }

    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    pub fn b1_len(&self) -> usize {
        self.b1.len()
    }

    pub fn b2_len(&self) -> usize {
        self.b2.len()
    }

    /// Resident membership; ghost keys are not resident.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Moves a resident entry to the MRU end of T2, optionally replacing its
    /// value, and returns the new handle.
    fn promote(&mut self, key: &K, value: Option<V>) -> Option<SlotId> {
        let (segment, id) = *self.index.get(key)?;
        let id = match segment {
            Segment::T1 => {
                let (k, old) = self.t1.remove(id)?;
                self.t2.push_front((k, value.unwrap_or(old)))
            },
            Segment::T2 => {
                if let (Some(entry), Some(v)) = (self.t2.get_mut(id), value) {
                    entry.1 = v;
                }
                self.t2.move_to_front(id);
                id
            },
        };
        self.index.insert(key.clone(), (Segment::T2, id));
        Some(id)
    }

    fn replace(&mut self, from_b1: bool) {
        let t1_len = self.t1.len();
        let prefer_t1 = t1_len > 0 && (t1_len > self.p || (from_b1 && t1_len == self.p));

        let (evicted, into_b1) = if prefer_t1 || self.t2.is_empty() {
            (self.t1.pop_back(), true)
        } else {
            (self.t2.pop_back(), false)
        };

        if let Some((key, value)) = evicted {
            self.index.remove(&key);
            if into_b1 {
                self.b1.record(key.clone());
            } else {
                self.b2.record(key.clone());
            }
            self.events.emit(&Event::eviction(key, value));
        }
    }

    fn is_full(&self) -> bool {
        self.t1.len() + self.t2.len() >= self.capacity
    }

    fn insert_t2(&mut self, key: K, value: V) {
        let id = self.t2.push_front((key.clone(), value));
        self.index.insert(key, (Segment::T2, id));
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        // 1. Resident entries fit and the index mirrors T1 ∪ T2.
        assert!(self.t1.len() + self.t2.len() <= self.capacity);
        assert_eq!(self.index.len(), self.t1.len() + self.t2.len());
        for (key, &(segment, id)) in &self.index {
            let list = match segment {
                Segment::T1 => &self.t1,
                Segment::T2 => &self.t2,
            };
            let (node_key, _) = list.get(id).expect("indexed node missing");
            assert!(node_key == key, "index points at wrong node");

            // 2. A resident key is never also a ghost.
            assert!(!self.b1.contains(key) && !self.b2.contains(key));
        }

        // 3. Adaptation target and ghost bounds.
        assert!(self.p <= self.capacity);
        assert!(self.b1.len() <= self.capacity);
        assert!(self.b2.len() <= self.capacity);

        self.t1.debug_validate_invariants();
        self.t2.debug_validate_invariants();
        self.b1.debug_validate_invariants();
        self.b2.debug_validate_invariants();
    }
}

impl<K, V> Cache<K, V> for ArcCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let id = self.promote(key, None).ok_or(CacheError::NotFound)?;
        self.t2
            .get(id)
            .map(|(_, v)| v.clone())
            .ok_or(CacheError::NotFound)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        if self.index.contains_key(&key) {
            self.promote(&key, Some(value));
            return Ok(());
        }

        if self.b1.contains(&key) {
            let delta = (self.b2.len() / self.b1.len()).max(1);
            self.p = (self.p + delta).min(self.capacity);
            self.b1.remove(&key);
            if self.is_full() {
                self.replace(true);
            }
            self.insert_t2(key, value);
            return Ok(());
        }

        if self.b2.contains(&key) {
            let delta = (self.b1.len() / self.b2.len()).max(1);
            self.p = self.p.saturating_sub(delta);
            self.b2.remove(&key);
            if self.is_full() {
                self.replace(false);
            }
            self.insert_t2(key, value);
            return Ok(());
        }

        if self.is_full() {
            self.replace(false);
        }
        let id = self.t1.push_front((key.clone(), value));
        self.index.insert(key, (Segment::T1, id));
        Ok(())
    }

    /// Removes `key` from whichever of T1, T2, B1 or B2 holds it.
    fn delete(&mut self, key: &K) -> CacheResult<()> {
        if let Some((segment, id)) = self.index.remove(key) {
            match segment {
                Segment::T1 => self.t1.remove(id),
                Segment::T2 => self.t2.remove(id),
            };
            return Ok(());
        }
        if self.b1.remove(key) || self.b2.remove(key) {
            return Ok(());
        }
        Err(CacheError::NotFound)
    }

    fn clear(&mut self) {
        self.index.clear();
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }

    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> IterableCache<K, V> for ArcCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.t1.iter().chain(self.t2.iter()) {
            if !visit(k, v) {
                break;
            }
        }
    }
}

impl<K, V> ObservableCache<K, V> for ArcCache<K, V> {
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }
}

impl<K, V> fmt::Debug for ArcCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArcCache")
            .field("capacity", &self.capacity)
            .field("p", &self.p)
            .field("t1_len", &self.t1.len())
            .field("t2_len", &self.t2.len())
            .field("b1_len", &self.b1.len())
            .field("b2_len", &self.b2.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn record_evictions(cache: &ArcCache<&'static str, i32>) -> Arc<Mutex<Vec<&'static str>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        cache.on_event(move |event| sink.lock().push(event.key));
        log
    }

    #[test]
    fn arc_new_cache() {
        let cache: ArcCache<u32, u32> = ArcCache::new(4);
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.p_value(), 0);
        assert!(cache.is_empty());
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_debug_reports_list_sizes() {
        let mut cache = ArcCache::new(2);
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            cache.set(k, v).unwrap();
        }
        let text = format!("{cache:?}");
        assert!(text.starts_with("ArcCache"), "{text}");
        assert!(text.contains("t1_len: 2"), "{text}");
        assert!(text.contains("b1_len: 1"), "{text}");
        assert!(text.contains("b2_len: 0"), "{text}");
    }

    #[test]
    fn arc_zero_capacity_becomes_one() {
        let mut cache = ArcCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.set(1, 1).unwrap();
        cache.set(2, 2).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2).unwrap(), 2);
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_promotion_t1_to_t2() {
        let mut cache = ArcCache::new(4);
        cache.set("a", 1).unwrap();
        assert_eq!((cache.t1_len(), cache.t2_len()), (1, 0));

        assert_eq!(cache.get(&"a").unwrap(), 1);
        assert_eq!((cache.t1_len(), cache.t2_len()), (0, 1));

        cache.set("b", 2).unwrap();
        cache.set("b", 20).unwrap();
        assert_eq!((cache.t1_len(), cache.t2_len()), (0, 2));
        assert_eq!(cache.get(&"b").unwrap(), 20);
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_new_keys_evict_from_t1_when_t1_exceeds_p() {
        let mut cache = ArcCache::new(4);
        let log = record_evictions(&cache);
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            cache.set(k, v).unwrap();
        }
        cache.get(&"a").unwrap();
        cache.get(&"b").unwrap();
        cache.set("e", 5).unwrap();

        assert_eq!(*log.lock(), vec!["c"]);
        assert_eq!(cache.get(&"a").unwrap(), 1);
        assert_eq!(cache.get(&"b").unwrap(), 2);
        assert_eq!(cache.b1_len(), 1);
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_b1_hit_grows_p_and_lands_in_t2() {
        let mut cache = ArcCache::new(2);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.set("c", 3).unwrap();
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.b1_len(), 1);

        cache.set("a", 10).unwrap();
        assert_eq!(cache.p_value(), 1);
        assert_eq!((cache.t1_len(), cache.t2_len()), (1, 1));
        // "b" was the T1 tail when the ghost hit forced a replacement.
        assert!(!cache.contains(&"b"));
        assert_eq!(cache.get(&"a").unwrap(), 10);
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_b2_hit_shrinks_p() {
        let mut cache = ArcCache::new(2);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.set("c", 3).unwrap();
        cache.set("a", 10).unwrap(); // B1 hit, p = 1; T1 [c], T2 [a], B1 [b]
        cache.get(&"a").unwrap();

        cache.set("d", 4).unwrap(); // |T1| == p, not from B1: evict T2 tail "a"
        assert_eq!(cache.b2_len(), 1);
        assert!(!cache.contains(&"a"));

        cache.set("a", 11).unwrap(); // B2 hit
        assert_eq!(cache.p_value(), 0);
        assert_eq!(cache.get(&"a").unwrap(), 11);
        assert!(!cache.contains(&"c"));
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_get_on_ghost_is_a_miss_without_adaptation() {
        let mut cache = ArcCache::new(1);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        assert_eq!(cache.b1_len(), 1);

        assert!(cache.get(&"a").unwrap_err().is_not_found());
        assert_eq!(cache.p_value(), 0);
        assert_eq!(cache.b1_len(), 1);
    }

    #[test]
    fn arc_ghost_lists_are_bounded() {
        let mut cache = ArcCache::new(3);
        for i in 0..50 {
            cache.set(i, i).unwrap();
        }
        assert_eq!(cache.b1_len(), 3);
        assert_eq!(cache.len(), 3);
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_delete_checks_all_four_lists() {
        let mut cache = ArcCache::new(2);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.get(&"b").unwrap();
        cache.set("c", 3).unwrap(); // "a" → B1

        cache.delete(&"b").unwrap(); // T2
        cache.delete(&"c").unwrap(); // T1
        cache.delete(&"a").unwrap(); // B1 ghost
        assert!(cache.delete(&"a").unwrap_err().is_not_found());
        assert_eq!(cache.b1_len(), 0);
        assert!(cache.is_empty());
        cache.debug_validate_invariants();
    }

    #[test]
    fn arc_clear_resets_lists_and_p() {
        let mut cache = ArcCache::new(2);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.set("c", 3).unwrap();
        cache.set("a", 1).unwrap();
        assert!(cache.p_value() > 0);

        cache.clear();
        assert_eq!(cache.p_value(), 0);
        assert_eq!(
            (cache.t1_len(), cache.t2_len(), cache.b1_len(), cache.b2_len()),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn arc_range_skips_ghosts() {
        let mut cache = ArcCache::new(2);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.get(&"a").unwrap();
        cache.set("c", 3).unwrap();

        let mut keys = Vec::new();
        cache.range(&mut |k, _| {
            keys.push(*k);
            true
        });
        keys.sort();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
