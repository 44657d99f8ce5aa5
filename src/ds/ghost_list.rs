//! Bounded key-only recency list.
//!
//! ARC keeps the keys (never the values) of recently evicted entries in two of
//! these. A hit in a ghost list tells ARC that the key was evicted too early.
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        list: IntrusiveList<K>
//!   ┌─────────┬─────────┐              head ─► [C] ◄──► [B] ◄──► [A] ◄── tail
//!   │  key A  │  id_0   │                newest                  oldest
//!   │  key B  │  id_1   │
//!   │  key C  │  id_2   │
//!   └─────────┴─────────┘
//! ```
//!
//! Once `len == capacity`, recording a new key drops the oldest ghost.
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;

/// Bounded recency list of keys.
#[derive(Debug)]
pub struct GhostList<K> {
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
    capacity: usize,
}

impl<K> GhostList<K> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<K> GhostList<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates a ghost list holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            list: IntrusiveList::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Records `key` as the newest ghost.
    ///
    /// Returns the oldest ghost if it had to be dropped to stay within
    /// capacity. A zero-capacity list records nothing.
    pub fn record(&mut self, key: K) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }

        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            return None;
        }

        let dropped = if self.list.len() >= self.capacity {
            let oldest = self.list.pop_back();
            if let Some(old) = &oldest {
                self.index.remove(old);
            }
            oldest
        } else {
            None
        };

        let id = self.list.push_front(key.clone());
        self.index.insert(key, id);
        dropped
    }

    /// Removes `key`; returns `true` if it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(id) => {
                self.list.remove(id);
                true
            },
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.list.len(), self.index.len());
        assert!(self.list.len() <= self.capacity);
        for (key, &id) in &self.index {
            assert!(self.list.get(id) == Some(key), "index points at wrong node");
        }
        self.list.debug_validate_invariants();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_list_drops_oldest_when_full() {
        let mut ghost = GhostList::new(2);
        assert_eq!(ghost.record("a"), None);
        assert_eq!(ghost.record("b"), None);
        assert_eq!(ghost.record("c"), Some("a"));

        assert!(!ghost.contains(&"a"));
        assert!(ghost.contains(&"b"));
        assert!(ghost.contains(&"c"));
        ghost.debug_validate_invariants();
    }

    #[test]
    fn ghost_list_rerecord_refreshes_position() {
        let mut ghost = GhostList::new(2);
        ghost.record("a");
        ghost.record("b");
        ghost.record("a");
        assert_eq!(ghost.record("c"), Some("b"));
        assert!(ghost.contains(&"a"));
        assert_eq!(ghost.len(), 2);
    }

    #[test]
    fn ghost_list_zero_capacity_records_nothing() {
        let mut ghost = GhostList::new(0);
        assert_eq!(ghost.record("a"), None);
        assert!(ghost.is_empty());
        assert!(!ghost.contains(&"a"));
    }

    #[test]
    fn ghost_list_remove_and_clear() {
        let mut ghost = GhostList::new(3);
        ghost.record(1);
        ghost.record(2);
        assert!(ghost.remove(&1));
        assert!(!ghost.remove(&1));
        assert_eq!(ghost.len(), 1);

        ghost.clear();
        assert!(ghost.is_empty());
        ghost.debug_validate_invariants();
    }
}
