//! # Indexed Binary Min-Heap
//!
//! Backs the LFU and TTL strategies. Items are ordered by a priority (access
//! count or expiry instant) and every item remembers its own position in the
//! heap array, so a strategy holding a [`SlotId`] can re-prioritize or remove
//! an arbitrary item in O(log n) instead of scanning.
//!
//! ## Architecture
//!
//! ```text
//!   items: SlotArena<T>                      order: Vec<SlotId>  (heap array)
//!   ┌────────┬──────────────────────────┐    ┌─────┬─────┬─────┬─────┐
//!   │ SlotId │ item { key, prio, index }│    │ s2  │ s0  │ s3  │ s1  │
//!   ├────────┼──────────────────────────┤    └─────┴─────┴─────┴─────┘
//!   │ s0     │ { a, 3, index: 1 }       │       0     1     2     3
//!   │ s1     │ { b, 4, index: 3 }       │
//!   │ s2     │ { c, 1, index: 0 }       │    invariant: items[order[i]].index == i
//!   │ s3     │ { d, 2, index: 2 }       │               prio(parent) <= prio(child)
//!   └────────┴──────────────────────────┘
//! ```
//!
//! Every swap performed by a sift rewrites the cached index of both items.
//! Strategies keep `K -> SlotId` in their own map; the `SlotId` never changes
//! while the item is in the heap, only the cached index does.
//!
//! ## Operations
//!
//! | Operation       | Time      | Notes                                     |
//! |-----------------|-----------|-------------------------------------------|
//! | `push`          | O(log n)  | Append, sift up                           |
//! | `pop_min`       | O(log n)  | Swap root with last, shrink, sift down    |
//! | `peek`          | O(1)      | Minimum without removal                   |
//! | `fix(index)`    | O(log n)  | Restore order after a priority change     |
//! | `remove(index)` | O(log n)  | Swap with last, pop, fix                  |
//!
//! Equal priorities are ordered by heap structure only; no insertion-order
//! tie break is applied.
//!
//! ## Example
//!
//! ```
//! use stratacache::ds::{FrequencyItem, HeapItem, PriorityHeap};
//!
//! let mut heap = PriorityHeap::new();
//! let a = heap.push(FrequencyItem::new("a", 10, 3));
//! heap.push(FrequencyItem::new("b", 20, 1));
//!
//! assert_eq!(heap.peek().map(|item| *item.key()), Some("b"));
//!
//! // Drop `a` to priority 0 and restore heap order.
//! let index = heap.get(a).unwrap().index();
//! heap.get_mut(a).unwrap().set_priority(0);
//! heap.fix(index);
//! assert_eq!(heap.pop_min().map(|item| item.into_entry()), Some(("a", 10)));
//! ```

use std::fmt;
use std::time::Instant;

use crate::ds::slot_arena::{SlotArena, SlotId};

/// An element that can live in a [`PriorityHeap`].
///
/// The priority type is fixed per item type, so LFU (counts) and TTL
/// (instants) heaps are distinct types resolved at compile time.
pub trait HeapItem {
    type Key;
    type Value;
    type Priority: Ord + Copy;

    fn priority(&self) -> Self::Priority;
    fn set_priority(&mut self, priority: Self::Priority);

    /// Current position in the heap array. Maintained by the heap.
    fn index(&self) -> usize;
    fn set_index(&mut self, index: usize);

    fn key(&self) -> &Self::Key;
    fn value(&self) -> &Self::Value;

    /// Replaces the value and returns the previous one.
    fn set_value(&mut self, value: Self::Value) -> Self::Value;

    fn into_entry(self) -> (Self::Key, Self::Value);
}

/// Key/value pair carrying a priority and its cached heap index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEntry<K, V, P> {
    key: K,
    value: V,
    priority: P,
    index: usize,
}

/// Heap entry ordered by access count.
pub type FrequencyItem<K, V> = HeapEntry<K, V, u64>;

/// Heap entry ordered by absolute expiry.
pub type ExpiryItem<K, V> = HeapEntry<K, V, Instant>;

impl<K, V, P> HeapEntry<K, V, P> {
    pub fn new(key: K, value: V, priority: P) -> Self {
        Self {
            key,
            value,
            priority,
            index: 0,
        }
    }
}

impl<K, V, P: Ord + Copy> HeapItem for HeapEntry<K, V, P> {
    type Key = K;
    type Value = V;
    type Priority = P;

    #[inline]
    fn priority(&self) -> P {
        self.priority
    }

    #[inline]
    fn set_priority(&mut self, priority: P) {
        self.priority = priority;
    }

    #[inline]
    fn index(&self) -> usize {
        self.index
    }

    #[inline]
    fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn value(&self) -> &V {
        &self.value
    }

    fn set_value(&mut self, value: V) -> V {
        std::mem::replace(&mut self.value, value)
    }

    fn into_entry(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Binary min-heap over [`HeapItem`]s with stable handles.
pub struct PriorityHeap<T> {
    items: SlotArena<T>,
    order: Vec<SlotId>,
}

impl<T: HeapItem> PriorityHeap<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: SlotArena::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts `item` and returns its stable handle.
    pub fn push(&mut self, mut item: T) -> SlotId {
        let index = self.order.len();
        item.set_index(index);
        let id = self.items.insert(item);
        self.order.push(id);
        self.sift_up(index);
        id
    }

    /// Removes and returns the item with the lowest priority.
    pub fn pop_min(&mut self) -> Option<T> {
        let last = self.order.len().checked_sub(1)?;
        self.swap(0, last);
        let id = self.order.pop()?;
        if !self.order.is_empty() {
            self.sift_down(0);
        }
        self.items.remove(id)
    }

    /// Returns the lowest-priority item without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.order.first().map(|&id| &self.items[id])
    }

    /// Restores heap order after the priority at `index` changed.
    ///
    /// Out-of-range indexes are ignored.
    pub fn fix(&mut self, index: usize) {
        if index >= self.order.len() {
            return;
        }
        if !self.sift_down(index) {
            self.sift_up(index);
        }
    }

    /// Removes the item at heap position `index`.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let last = self.order.len().checked_sub(1)?;
        if index > last {
            return None;
        }
        if index != last {
            self.swap(index, last);
        }
        let id = self.order.pop()?;
        self.fix(index);
        self.items.remove(id)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.items.get(id)
    }

    /// Mutable access to an item. Call [`fix`](Self::fix) with the item's
    /// index after changing its priority.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    /// Iterates items in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().map(|&id| &self.items[id])
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
    }

    #[inline]
    fn less(&self, i: usize, j: usize) -> bool {
        self.items[self.order[i]].priority() < self.items[self.order[j]].priority()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.order.swap(i, j);
        let (a, b) = (self.order[i], self.order[j]);
        self.items[a].set_index(i);
        self.items[b].set_index(j);
    }

    fn sift_up(&mut self, mut j: usize) {
        while j > 0 {
            let parent = (j - 1) / 2;
            if !self.less(j, parent) {
                break;
            }
            self.swap(parent, j);
            j = parent;
        }
    }

    /// Returns `true` if the item at `start` moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let n = self.order.len();
        let mut i = start;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > start
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.items.len(), self.order.len());
        for (i, &id) in self.order.iter().enumerate() {
            let item = self.items.get(id).expect("heap slot missing");
            assert_eq!(item.index(), i, "cached index out of sync");
            if i > 0 {
                let parent = &self.items[self.order[(i - 1) / 2]];
                assert!(
                    parent.priority() <= item.priority(),
                    "heap order violated at {i}"
                );
            }
        }
    }
}

impl<T: HeapItem> Default for PriorityHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HeapItem> fmt::Debug for PriorityHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityHeap")
            .field("len", &self.len())
            .finish()
    }
}
