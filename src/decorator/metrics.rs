//! Hit/miss/eviction accounting around any cache.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──get/set/delete──► MetricsCache ──────────► inner cache
//!                                   │                        │
//!                     record_hit / record_miss        Eviction, ReadBytes,
//!                                   │                 CompressBytes events
//!                                   ▼                        │
//!                           ┌──────────────┐    relay        │
//!                           │  Collector   │ ◄───────────────┘
//!                           │ (atomics)    │        │
//!                           └──────────────┘        ▼
//!                                             own EventBus ──► subscribers
//! ```
//!
//! [`MetricsCache::observing`] subscribes to the inner cache up front so that
//! evictions and compression byte counts reach the collector, and relays
//! those events to the decorator's subscribers. [`MetricsCache::new`] works
//! over any cache; if the inner cache is observable, the same relay is
//! installed by the first [`ObservableCache::on_event`] call, and eviction
//! counting starts from there. Hit and miss events are emitted by the
//! decorator itself.
//!
//! Counters use relaxed atomics: readers may see a snapshot that is a few
//! increments behind, but never a torn value.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus, EventKind};
use crate::traits::{Cache, IterableCache, ObservableCache};

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Sink for cache observations.
///
/// Methods take `&self` so one collector can be shared between the decorator
/// and the relay callback it registers on the inner cache.
pub trait Collector: Send + Sync + 'static {
    fn record_hit(&self);
    fn record_miss(&self);
    fn record_eviction(&self);
    /// Adds to the uncompressed and compressed byte totals.
    fn record_compression(&self, read_bytes: usize, compressed_bytes: usize);
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Point-in-time copy of the counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub read_bytes: u64,
    pub compressed_bytes: u64,
}

impl MetricsSnapshot {
    /// `hits / (hits + misses)`, or 0 before any observation.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// `compressed_bytes / read_bytes`, or 0 before any compression.
    pub fn compression_ratio(&self) -> f64 {
        if self.read_bytes == 0 {
            return 0.0;
        }
        self.compressed_bytes as f64 / self.read_bytes as f64
    }
}

/// Default lock-free collector.
#[derive(Debug, Default)]
pub struct AtomicCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    read_bytes: AtomicU64,
    compressed_bytes: AtomicU64,
}

impl AtomicCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.read_bytes,
            &self.compressed_bytes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Collector for AtomicCollector {
    #[inline]
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_compression(&self, read_bytes: usize, compressed_bytes: usize) {
        self.read_bytes
            .fetch_add(read_bytes as u64, Ordering::Relaxed);
        self.compressed_bytes
            .fetch_add(compressed_bytes as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            compressed_bytes: self.compressed_bytes.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsCache
// ---------------------------------------------------------------------------

/// Decorator that counts outcomes of the calls passing through it.
///
/// # Example
///
/// ```
/// use stratacache::decorator::metrics::MetricsCache;
/// use stratacache::policy::lru::LruCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = MetricsCache::observing(LruCache::new(1));
/// cache.set("a", 1).unwrap();
/// cache.get(&"a").unwrap();
/// cache.set("b", 2).unwrap(); // evicts "a"
/// assert!(cache.get(&"a").is_err());
///
/// let stats = cache.snapshot();
/// assert_eq!((stats.hits, stats.misses, stats.evictions), (1, 1, 1));
/// assert_eq!(cache.hit_rate(), 0.5);
/// ```
pub struct MetricsCache<C, K, V, M = AtomicCollector> {
    inner: C,
    collector: Arc<M>,
    events: EventBus<K, V>,
    relayed: AtomicBool,
}

impl<C, K, V> MetricsCache<C, K, V, AtomicCollector> {
    /// Wraps `inner` without subscribing to it yet.
    pub fn new(inner: C) -> Self {
        Self::with_collector(inner, Arc::new(AtomicCollector::new()))
    }
}

impl<C, K, V> MetricsCache<C, K, V, AtomicCollector>
where
    C: ObservableCache<K, V>,
    K: 'static,
    V: 'static,
{
    /// Wraps `inner` and subscribes to its events.
    pub fn observing(inner: C) -> Self {
        Self::observing_with_collector(inner, Arc::new(AtomicCollector::new()))
    }
}

impl<C, K, V, M: Collector> MetricsCache<C, K, V, M> {
    pub fn with_collector(inner: C, collector: Arc<M>) -> Self {
        Self {
            inner,
            collector,
            events: EventBus::new(),
            relayed: AtomicBool::new(false),
        }
    }

    pub fn observing_with_collector(inner: C, collector: Arc<M>) -> Self
    where
        C: ObservableCache<K, V>,
        K: 'static,
        V: 'static,
        M: 'static,
    {
        let cache = Self::with_collector(inner, collector);
        cache.install_relay();
        cache
    }

    /// Subscribes to the inner cache once; later calls are no-ops.
    fn install_relay(&self)
    where
        C: ObservableCache<K, V>,
        K: 'static,
        V: 'static,
        M: 'static,
    {
        if self.relayed.swap(true, Ordering::AcqRel) {
            return;
        }
        let relay_events = self.events.clone();
        let relay_collector = Arc::clone(&self.collector);
        self.inner.on_event(move |event: &Event<K, V>| {
            match event.kind {
                EventKind::Eviction => relay_collector.record_eviction(),
                EventKind::ReadBytes => relay_collector.record_compression(event.size, 0),
                EventKind::CompressBytes => relay_collector.record_compression(0, event.size),
                // An inner decorator's own hit/miss accounting is not ours.
                EventKind::Hit | EventKind::Miss => return,
            }
            relay_events.emit(event);
        });
    }

    pub fn collector(&self) -> &Arc<M> {
        &self.collector
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.collector.snapshot()
    }

    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    pub fn compression_ratio(&self) -> f64 {
        self.snapshot().compression_ratio()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C, K, V, M> Cache<K, V> for MetricsCache<C, K, V, M>
where
    C: Cache<K, V>,
    K: Eq + Hash + Clone,
    M: Collector,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        match self.inner.get(key) {
            Ok(value) => {
                self.collector.record_hit();
                if self.events.has_subscribers() {
                    self.events.emit(&Event::hit(key.clone()));
                }
                Ok(value)
            },
            Err(CacheError::NotFound) => {
                self.collector.record_miss();
                if self.events.has_subscribers() {
                    self.events.emit(&Event::miss(key.clone()));
                }
                Err(CacheError::NotFound)
            },
            Err(err) => Err(err),
        }
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        self.inner.set(key, value)
    }

    /// Deletes are not lookups; neither outcome touches the counters.
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

impl<C, K, V, M> IterableCache<K, V> for MetricsCache<C, K, V, M>
where
    C: IterableCache<K, V>,
    K: Eq + Hash + Clone,
    M: Collector,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        self.inner.range(visit);
    }
}

impl<C, K, V, M> ObservableCache<K, V> for MetricsCache<C, K, V, M>
where
    C: ObservableCache<K, V>,
    K: 'static,
    V: 'static,
    M: Collector + 'static,
{
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.install_relay();
        self.events.subscribe(callback);
    }
}

impl<C: fmt::Debug, K, V, M: Collector> fmt::Debug for MetricsCache<C, K, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCache")
            .field("inner", &self.inner)
            .field("metrics", &self.collector.snapshot())
            .finish()
    }
}
