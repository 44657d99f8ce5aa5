//! Unified cache builder for all eviction policies.
//!
//! Picks a strategy at runtime and hides it behind [`PolicyCache`], an enum
//! that implements all three cache contracts by dispatching to the concrete
//! strategy.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use stratacache::builder::{CacheBuilder, CachePolicy};
//! use stratacache::traits::Cache;
//!
//! let mut cache = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Lru);
//! cache.set(1, "hello".to_string()).unwrap();
//! assert_eq!(cache.get(&1).unwrap(), "hello");
//!
//! let sessions = CacheBuilder::new(100)
//!     .sweep_interval(None)
//!     .build::<u64, String>(CachePolicy::Ttl { ttl: Duration::from_secs(30) });
//! assert_eq!(sessions.policy(), CachePolicy::Ttl { ttl: Duration::from_secs(30) });
//! ```

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::error::CacheResult;
use crate::event::Event;
use crate::policy::arc::ArcCache;
use crate::policy::fifo::FifoCache;
use crate::policy::lfu::LfuCache;
use crate::policy::lru::LruCache;
use crate::policy::ttl::{MonotonicClock, SweepMode, TtlCache};
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Available cache eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// First In, First Out eviction.
    Fifo,
    /// Least Recently Used eviction.
    Lru,
    /// Least Frequently Used eviction (heap-based).
    Lfu,
    /// Adaptive Replacement Cache.
    Arc,
    /// Expiry after `ttl`; capacity pressure evicts the earliest expiry.
    Ttl { ttl: Duration },
}

/// Cache built by [`CacheBuilder`], dispatching to one strategy.
pub enum PolicyCache<K, V> {
    Fifo(FifoCache<K, V>),
    Lru(LruCache<K, V>),
    Lfu(LfuCache<K, V>),
    Arc(ArcCache<K, V>),
    Ttl(TtlCache<K, V>),
}

/// Boxed constructor producing fresh caches of one configuration, e.g. as
/// the target factory for [`snapshot`](crate::decorator::functional::snapshot).
pub type CacheFactory<K, V> = Box<dyn Fn() -> PolicyCache<K, V> + Send + Sync>;

macro_rules! dispatch {
    ($value:expr, $cache:ident => $body:expr) => {
        match $value {
            PolicyCache::Fifo($cache) => $body,
            PolicyCache::Lru($cache) => $body,
            PolicyCache::Lfu($cache) => $body,
            PolicyCache::Arc($cache) => $body,
            PolicyCache::Ttl($cache) => $body,
        }
    };
}

impl<K, V> PolicyCache<K, V> {
    /// The policy this cache was built with.
    pub fn policy(&self) -> CachePolicy {
        match self {
            PolicyCache::Fifo(_) => CachePolicy::Fifo,
            PolicyCache::Lru(_) => CachePolicy::Lru,
            PolicyCache::Lfu(_) => CachePolicy::Lfu,
            PolicyCache::Arc(_) => CachePolicy::Arc,
            PolicyCache::Ttl(ttl) => CachePolicy::Ttl {
                ttl: ttl.default_ttl(),
            },
        }
    }

    pub fn as_ttl(&self) -> Option<&TtlCache<K, V>> {
        match self {
            PolicyCache::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }

    pub fn as_ttl_mut(&mut self) -> Option<&mut TtlCache<K, V>> {
        match self {
            PolicyCache::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }
}

impl<K, V> Cache<K, V> for PolicyCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        dispatch!(self, cache => cache.get(key))
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        dispatch!(self, cache => cache.set(key, value))
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        dispatch!(self, cache => cache.delete(key))
    }

    fn clear(&mut self) {
        dispatch!(self, cache => cache.clear())
    }

    fn len(&self) -> usize {
        dispatch!(self, cache => cache.len())
    }

    fn capacity(&self) -> usize {
        dispatch!(self, cache => cache.capacity())
    }
}

impl<K, V> IterableCache<K, V> for PolicyCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        dispatch!(self, cache => cache.range(visit))
    }
}

impl<K, V> ObservableCache<K, V> for PolicyCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        dispatch!(self, cache => cache.on_event(callback))
    }
}

impl<K, V> fmt::Debug for PolicyCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, cache => fmt::Debug::fmt(cache, f))
    }
}

/// Builder for creating cache instances.
#[derive(Debug, Clone, Copy)]
pub struct CacheBuilder {
    capacity: usize,
    sweep: Option<SweepMode>,
}

impl CacheBuilder {
    /// Create a new cache builder with the specified capacity (0 becomes 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sweep: None,
        }
    }

    /// Background sweep interval for TTL caches; `None` disables the sweeper.
    ///
    /// When never called, TTL caches sweep at half their TTL.
    pub fn sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep = Some(match interval {
            Some(interval) => SweepMode::Interval(interval),
            None => SweepMode::Disabled,
        });
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Build a cache with the specified policy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stratacache::builder::{CacheBuilder, CachePolicy};
    /// use stratacache::traits::Cache;
    ///
    /// let fifo = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Fifo);
    /// let arc = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Arc);
    /// assert_eq!(arc.capacity(), fifo.capacity());
    /// ```
    pub fn build<K, V>(self, policy: CachePolicy) -> PolicyCache<K, V>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        match policy {
            CachePolicy::Fifo => PolicyCache::Fifo(FifoCache::new(self.capacity)),
            CachePolicy::Lru => PolicyCache::Lru(LruCache::new(self.capacity)),
            CachePolicy::Lfu => PolicyCache::Lfu(LfuCache::new(self.capacity)),
            CachePolicy::Arc => PolicyCache::Arc(ArcCache::new(self.capacity)),
            CachePolicy::Ttl { ttl } => {
                let sweep = self.sweep.unwrap_or_else(|| SweepMode::for_ttl(ttl));
                PolicyCache::Ttl(TtlCache::with_clock(
                    self.capacity,
                    ttl,
                    MonotonicClock,
                    sweep,
                ))
            },
        }
    }

    /// Returns a factory that builds a fresh cache with this configuration
    /// on every call.
    pub fn factory<K, V>(self, policy: CachePolicy) -> CacheFactory<K, V>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        Box::new(move || self.build(policy))
    }
}
