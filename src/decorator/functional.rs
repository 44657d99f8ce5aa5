//! Map, filter and reduce over caches.
//!
//! Two shapes are offered on purpose:
//!
//! | Shape    | Type / function                   | Sees later source writes | Owns data |
//! |----------|-----------------------------------|--------------------------|-----------|
//! | Live     | [`MapView`], [`FilterView`]       | yes                      | no        |
//! | Snapshot | [`snapshot`], [`map_snapshot`],   | no                       | yes       |
//! |          | [`filter_snapshot`]               |                          |           |
//! | Fold     | [`reduce`]                        | n/a (returns a value)    | n/a       |
//!
//! Live views wrap the source and apply the transform on every call.
//! Snapshots copy the source once, through `range`, into a cache built by a
//! caller-supplied factory; the copy is independent afterwards.

use std::fmt;
use std::sync::Arc;

use crate::error::{CacheError, CacheResult};
use crate::event::Event;
use crate::traits::{Cache, IterableCache, ObservableCache};

// ---------------------------------------------------------------------------
// MapView
// ---------------------------------------------------------------------------

/// Live view applying `mapper` to every value read through it.
///
/// Writes store the caller's value unchanged, so reading back a key yields
/// `mapper(value)`.
///
/// # Example
///
/// ```
/// use stratacache::decorator::functional::MapView;
/// use stratacache::policy::lru::LruCache;
/// use stratacache::traits::Cache;
///
/// let mut doubled = MapView::new(LruCache::new(4), |v: &i32| v * 2);
/// doubled.set("a", 21).unwrap();
/// assert_eq!(doubled.get(&"a").unwrap(), 42);
/// assert_eq!(doubled.inner().peek_lru(), Some((&"a", &21)));
/// ```
pub struct MapView<C, F> {
    inner: C,
    mapper: Arc<F>,
}

impl<C, F> MapView<C, F> {
    pub fn new(inner: C, mapper: F) -> Self {
        Self {
            inner,
            mapper: Arc::new(mapper),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C, F, K, V> Cache<K, V> for MapView<C, F>
where
    C: Cache<K, V>,
    F: Fn(&V) -> V,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        self.inner.get(key).map(|value| (self.mapper)(&value))
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        self.inner.delete(key)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<C, F, K, V> IterableCache<K, V> for MapView<C, F>
where
    C: IterableCache<K, V>,
    F: Fn(&V) -> V,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let mapper = &*self.mapper;
        self.inner.range(&mut |key, value| visit(key, &mapper(value)));
    }
}

/// Subscribers see evicted values after the mapper has been applied.
impl<C, F, K, V> ObservableCache<K, V> for MapView<C, F>
where
    C: ObservableCache<K, V>,
    F: Fn(&V) -> V + Send + Sync + 'static,
    K: Clone + 'static,
    V: Clone + 'static,
{
    fn on_event<G>(&self, callback: G)
    where
        G: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        let mapper = Arc::clone(&self.mapper);
        self.inner.on_event(move |event: &Event<K, V>| {
            let mapped = event.clone().map_value(|value| Some(mapper(&value)));
            callback(&mapped);
        });
    }
}

impl<C: fmt::Debug, F> fmt::Debug for MapView<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapView")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FilterView
// ---------------------------------------------------------------------------

/// Live view exposing only entries whose value satisfies `predicate`.
///
/// | Call     | Visible entry       | Hidden or absent entry            |
/// |----------|---------------------|-----------------------------------|
/// | `get`    | value               | `NotFound`                        |
/// | `set`    | stored              | `FilteredOut`, source untouched   |
/// | `delete` | removed from source | `NotFound`, source untouched      |
/// | `clear`  | removed from source | kept                              |
/// | `len`    | counted             | not counted                       |
///
/// Visibility checks for `delete`, `clear` and `len` scan the source with
/// `range`, so they are O(n) and never disturb the source's eviction order.
///
/// # Example
///
/// ```
/// use stratacache::decorator::functional::FilterView;
/// use stratacache::error::CacheError;
/// use stratacache::policy::fifo::FifoCache;
/// use stratacache::traits::Cache;
///
/// let mut even = FilterView::new(FifoCache::new(4), |v: &u32| v % 2 == 0);
/// even.set("two", 2).unwrap();
/// assert!(matches!(even.set("three", 3), Err(CacheError::FilteredOut)));
/// assert_eq!(even.len(), 1);
/// ```
pub struct FilterView<C, P> {
    inner: C,
    predicate: Arc<P>,
}

impl<C, P> FilterView<C, P> {
    pub fn new(inner: C, predicate: P) -> Self {
        Self {
            inner,
            predicate: Arc::new(predicate),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn is_visible<K, V>(&self, key: &K) -> bool
    where
        C: IterableCache<K, V>,
        P: Fn(&V) -> bool,
        K: PartialEq,
    {
        let predicate = &*self.predicate;
        let mut visible = false;
        self.inner.range(&mut |k, v| {
            if k == key {
                visible = predicate(v);
                return false;
            }
            true
        });
        visible
    }
}

impl<C, P, K, V> Cache<K, V> for FilterView<C, P>
where
    C: IterableCache<K, V>,
    P: Fn(&V) -> bool,
    K: PartialEq + Clone,
{
    /// Hidden entries are not read from the inner cache, so their recency
    /// and frequency stay as they were.
    fn get(&mut self, key: &K) -> CacheResult<V> {
        if !self.is_visible::<K, V>(key) {
            return Err(CacheError::NotFound);
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        if !(self.predicate)(&value) {
            return Err(CacheError::FilteredOut);
        }
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        if !self.is_visible::<K, V>(key) {
            return Err(CacheError::NotFound);
        }
        self.inner.delete(key)
    }

    /// Removes the visible entries only.
    fn clear(&mut self) {
        let predicate = &*self.predicate;
        let mut visible = Vec::new();
        self.inner.range(&mut |k, v| {
            if predicate(v) {
                visible.push(k.clone());
            }
            true
        });
        for key in &visible {
            // Visible a moment ago; a concurrent expiry is the only miss.
            let _ = self.inner.delete(key);
        }
    }

    fn len(&self) -> usize {
        let predicate = &*self.predicate;
        let mut count = 0;
        self.inner.range(&mut |_, v| {
            if predicate(v) {
                count += 1;
            }
            true
        });
        count
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<C, P, K, V> IterableCache<K, V> for FilterView<C, P>
where
    C: IterableCache<K, V>,
    P: Fn(&V) -> bool,
    K: PartialEq + Clone,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let predicate = &*self.predicate;
        self.inner.range(&mut |key, value| {
            if predicate(value) {
                visit(key, value)
            } else {
                true
            }
        });
    }
}

/// Events carrying a value that fails the predicate are dropped; events
/// without a value are forwarded as-is.
impl<C, P, K, V> ObservableCache<K, V> for FilterView<C, P>
where
    C: ObservableCache<K, V>,
    P: Fn(&V) -> bool + Send + Sync + 'static,
{
    fn on_event<G>(&self, callback: G)
    where
        G: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        let predicate = Arc::clone(&self.predicate);
        self.inner.on_event(move |event: &Event<K, V>| {
            if event.value.as_ref().is_none_or(|value| predicate(value)) {
                callback(event);
            }
        });
    }
}

impl<C: fmt::Debug, P> fmt::Debug for FilterView<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterView")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Copies every entry of `source` into a fresh cache from `factory`.
///
/// Entries are written in `range` order, so a target smaller than the source
/// keeps whatever its own policy retains. The first failing `set` stops the
/// copy and is returned.
pub fn snapshot<S, T, K, V>(source: &S, factory: impl FnOnce() -> T) -> CacheResult<T>
where
    S: IterableCache<K, V> + ?Sized,
    T: Cache<K, V>,
    K: Clone,
    V: Clone,
{
    copy_into(source, factory(), |_, value| Some(value.clone()))
}

/// Copies `source` into a fresh cache, transforming each value.
///
/// # Example
///
/// ```
/// use stratacache::decorator::functional::map_snapshot;
/// use stratacache::policy::fifo::FifoCache;
/// use stratacache::traits::Cache;
///
/// let mut prices = FifoCache::new(4);
/// prices.set("tea", 3u32).unwrap();
///
/// let mut labels = map_snapshot(&prices, |p: &u32| format!("${p}"), || FifoCache::new(4)).unwrap();
/// prices.set("tea", 4).unwrap();
/// assert_eq!(labels.get(&"tea").unwrap(), "$3");
/// ```
pub fn map_snapshot<S, T, K, V, U>(
    source: &S,
    mut mapper: impl FnMut(&V) -> U,
    factory: impl FnOnce() -> T,
) -> CacheResult<T>
where
    S: IterableCache<K, V> + ?Sized,
    T: Cache<K, U>,
    K: Clone,
{
    copy_into(source, factory(), |_, value| Some(mapper(value)))
}

/// Copies the entries of `source` whose value satisfies `predicate`.
pub fn filter_snapshot<S, T, K, V>(
    source: &S,
    mut predicate: impl FnMut(&V) -> bool,
    factory: impl FnOnce() -> T,
) -> CacheResult<T>
where
    S: IterableCache<K, V> + ?Sized,
    T: Cache<K, V>,
    K: Clone,
    V: Clone,
{
    copy_into(source, factory(), |_, value| {
        predicate(value).then(|| value.clone())
    })
}

fn copy_into<S, T, K, V, U>(
    source: &S,
    mut target: T,
    mut select: impl FnMut(&K, &V) -> Option<U>,
) -> CacheResult<T>
where
    S: IterableCache<K, V> + ?Sized,
    T: Cache<K, U>,
    K: Clone,
{
    let mut failure = None;
    source.range(&mut |key, value| {
        let Some(selected) = select(key, value) else {
            return true;
        };
        match target.set(key.clone(), selected) {
            Ok(()) => true,
            Err(err) => {
                failure = Some(err);
                false
            },
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(target),
    }
}

// ---------------------------------------------------------------------------
// Reduce
// ---------------------------------------------------------------------------

/// Folds every entry of `source` into one value, in `range` order.
///
/// # Example
///
/// ```
/// use stratacache::decorator::functional::reduce;
/// use stratacache::policy::lru::LruCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = LruCache::new(8);
/// for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
///     cache.set(k, v).unwrap();
/// }
/// assert_eq!(reduce(&cache, 0, |sum, _, v| sum + v), 6);
/// ```
pub fn reduce<S, K, V, R>(source: &S, init: R, mut f: impl FnMut(R, &K, &V) -> R) -> R
where
    S: IterableCache<K, V> + ?Sized,
{
    let mut acc = Some(init);
    source.range(&mut |key, value| {
        acc = acc.take().map(|current| f(current, key, value));
        true
    });
    match acc {
        Some(acc) => acc,
        None => unreachable!("accumulator is restored after every step"),
    }
}
