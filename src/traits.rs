//! # Cache Capability Contracts
//!
//! Every strategy and every decorator in this crate speaks the same small set
//! of traits, so decorators can wrap strategies (or each other) without
//! knowing anything about their internals.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────┐
//!                 │              Cache<K, V>                  │
//!                 │                                           │
//!                 │  get(&mut, &K)    → CacheResult<V>        │
//!                 │  set(&mut, K, V)  → CacheResult<()>       │
//!                 │  delete(&mut, &K) → CacheResult<()>       │
//!                 │  clear(&mut)                              │
//!                 │  len(&) / is_empty(&) / capacity(&)       │
//!                 └─────────────────────┬─────────────────────┘
//!                                       │
//!                                       ▼
//!                 ┌───────────────────────────────────────────┐
//!                 │          IterableCache<K, V>              │
//!                 │                                           │
//!                 │  range(&, &mut dyn FnMut(&K, &V) → bool)  │
//!                 └───────────────────────────────────────────┘
//!
//!                 ┌───────────────────────────────────────────┐
//!                 │          ObservableCache<K, V>            │
//!                 │                                           │
//!                 │  on_event(&, Fn(&Event<K, V>))            │
//!                 └───────────────────────────────────────────┘
//!
//!   Collaborators consumed by decorators:
//!
//!     Serializer<V>        encode(&V) → bytes, decode(&[u8]) → V
//!     ProbabilisticSet<K>  add(&K), test(&K) → bool, clear()
//! ```
//!
//! ## Trait Summary
//!
//! | Trait                 | Extends  | Purpose                                  |
//! |-----------------------|----------|------------------------------------------|
//! | `Cache`               | -        | Uniform get/set/delete/clear             |
//! | `IterableCache`       | `Cache`  | Point-in-time traversal of live entries  |
//! | `ObservableCache`     | -        | Subscribe to eviction and byte events    |
//! | `Serializer`          | -        | Value codec for the compression layer    |
//! | `ProbabilisticSet`    | -        | Membership filter for the bloom gate     |
//!
//! ## Thread Safety
//!
//! - `Cache` methods take `&mut self`; FIFO, LRU, LFU and ARC have no internal
//!   locking and need an external lock for shared use.
//! - The TTL strategy locks internally because its sweeper thread mutates the
//!   same state.
//! - `on_event` takes `&self`; subscriber lists are behind their own lock.

use crate::error::CacheResult;
use crate::event::Event;

/// Uniform cache contract implemented by every strategy and decorator.
///
/// # Example
///
/// ```
/// use stratacache::policy::fifo::FifoCache;
/// use stratacache::traits::Cache;
///
/// fn warm<C: Cache<u64, String>>(cache: &mut C, data: &[(u64, &str)]) {
///     for (key, value) in data {
///         cache.set(*key, value.to_string()).unwrap();
///     }
/// }
///
/// let mut cache = FifoCache::new(8);
/// warm(&mut cache, &[(1, "one"), (2, "two")]);
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.get(&1).unwrap(), "one");
/// ```
pub trait Cache<K, V> {
    /// Returns a copy of the value for `key`.
    ///
    /// May reorder internal state (recency, frequency). Fails with
    /// [`CacheError::NotFound`](crate::error::CacheError::NotFound) when the
    /// key is absent, expired or hidden.
    fn get(&mut self, key: &K) -> CacheResult<V>;

    /// Inserts or replaces the value for `key`, evicting per policy when full.
    fn set(&mut self, key: K, value: V) -> CacheResult<()>;

    /// Removes `key`. Fails with `NotFound` when there is nothing to remove.
    fn delete(&mut self, key: &K) -> CacheResult<()>;

    /// Removes every entry without emitting eviction events.
    fn clear(&mut self);

    /// Number of resident entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident entries.
    fn capacity(&self) -> usize;
}

/// A cache whose live entries can be traversed.
pub trait IterableCache<K, V>: Cache<K, V> {
    /// Visits every currently valid entry once, stopping early when `visit`
    /// returns `false`.
    ///
    /// The traversal reflects the cache at the time of the call and does not
    /// change eviction order.
    ///
    /// # Example
    ///
    /// ```
    /// use stratacache::policy::lru::LruCache;
    /// use stratacache::traits::{Cache, IterableCache};
    ///
    /// let mut cache = LruCache::new(4);
    /// for i in 0..4 {
    ///     cache.set(i, i * 10).unwrap();
    /// }
    ///
    /// let mut seen = 0;
    /// cache.range(&mut |_k, _v| {
    ///     seen += 1;
    ///     seen < 2
    /// });
    /// assert_eq!(seen, 2);
    /// ```
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool);
}

/// A cache that publishes [`Event`]s to subscribers.
pub trait ObservableCache<K, V> {
    /// Registers `callback` for the lifetime of the cache.
    ///
    /// Callbacks run synchronously on the thread that triggered the event, in
    /// registration order.
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static;
}

/// Value codec used by the compression decorator.
pub trait Serializer<V> {
    fn encode(&self, value: &V) -> CacheResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> CacheResult<V>;
}

/// Membership filter with no false negatives and no removal.
pub trait ProbabilisticSet<K: ?Sized> {
    fn add(&mut self, key: &K);

    /// `false` means "definitely never added since the last clear".
    fn test(&self, key: &K) -> bool;

    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    // Minimal vector-backed cache used to exercise the default methods.
    struct MockCache {
        data: Vec<(i32, String)>,
        capacity: usize,
    }

    impl Cache<i32, String> for MockCache {
        fn get(&mut self, key: &i32) -> CacheResult<String> {
            self.data
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or(CacheError::NotFound)
        }

        fn set(&mut self, key: i32, value: String) -> CacheResult<()> {
            if let Some((_, existing)) = self.data.iter_mut().find(|(k, _)| *k == key) {
                *existing = value;
                return Ok(());
            }
            if self.data.len() >= self.capacity {
                return Err(CacheError::CacheFull);
            }
            self.data.push((key, value));
            Ok(())
        }

        fn delete(&mut self, key: &i32) -> CacheResult<()> {
            let before = self.data.len();
            self.data.retain(|(k, _)| k != key);
            if self.data.len() == before {
                Err(CacheError::NotFound)
            } else {
                Ok(())
            }
        }

        fn clear(&mut self) {
            self.data.clear();
        }

        fn len(&self) -> usize {
            self.data.len()
        }

        fn capacity(&self) -> usize {
            self.capacity
        }
    }

    impl IterableCache<i32, String> for MockCache {
        fn range(&self, visit: &mut dyn FnMut(&i32, &String) -> bool) {
            for (k, v) in &self.data {
                if !visit(k, v) {
                    break;
                }
            }
        }
    }

    #[test]
    fn is_empty_defaults_to_len() {
        let mut cache = MockCache {
            data: Vec::new(),
            capacity: 2,
        };
        assert!(cache.is_empty());
        cache.set(1, "one".into()).unwrap();
        assert!(!cache.is_empty());
    }

    #[test]
    fn reserved_cache_full_is_reportable() {
        let mut cache = MockCache {
            data: Vec::new(),
            capacity: 1,
        };
        cache.set(1, "one".into()).unwrap();
        let err = cache.set(2, "two".into()).unwrap_err();
        assert!(matches!(err, CacheError::CacheFull));
    }

    #[test]
    fn range_stops_when_visitor_returns_false() {
        let mut cache = MockCache {
            data: Vec::new(),
            capacity: 8,
        };
        for i in 0..5 {
            cache.set(i, i.to_string()).unwrap();
        }
        let mut keys = Vec::new();
        cache.range(&mut |k, _| {
            keys.push(*k);
            keys.len() < 3
        });
        assert_eq!(keys, vec![0, 1, 2]);
    }

    #[test]
    fn range_supports_generic_folds() {
        fn total_len<C: IterableCache<i32, String>>(cache: &C) -> usize {
            let mut total = 0;
            cache.range(&mut |_, v| {
                total += v.len();
                true
            });
            total
        }

        let mut cache = MockCache {
            data: Vec::new(),
            capacity: 4,
        };
        cache.set(1, "ab".into()).unwrap();
        cache.set(2, "cde".into()).unwrap();
        assert_eq!(total_len(&cache), 5);
    }
}
