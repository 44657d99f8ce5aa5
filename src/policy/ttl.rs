//! # Time-To-Live Cache
//!
//! Entries expire at an absolute instant. The expiry instant is also the heap
//! priority, so the same [`PriorityHeap`] answers both "what expires next" and
//! "what goes when the cache is full".
//!
//! ## Architecture
//!
//! ```text
//!   TtlCache<K, V>
//!   ├── shared: Arc<Shared<K, V>> ─────────────────────────────┐
//!   │     ├── state: Mutex<TtlState>                           │
//!   │     │     ├── index: FxHashMap<K, SlotId>                │
//!   │     │     └── heap:  PriorityHeap<ExpiryItem<K, V>>      │ also held by
//!   │     ├── events: EventBus<K, V>                           │ the sweeper
//!   │     └── clock:  Arc<dyn Clock>                           │ thread
//!   └── sweeper: Option<Sweeper> ── JoinHandle + stop signal ──┘
//! ```
//!
//! ## Expiry Paths
//!
//! - **Lazy**: `get` (and `delete`) notice `now >= expiry`, drop the entry,
//!   emit `Eviction` and report `NotFound`.
//! - **Active**: the sweeper wakes every interval (default: half the default
//!   TTL), takes the lock once, pops while the heap minimum has expired, and
//!   releases the lock before emitting.
//!
//! ## Capacity Pressure
//!
//! A new key on a full cache evicts the *earliest-expiring* entry, whatever
//! its recency. A long-TTL entry written a moment ago can therefore outlive a
//! short-TTL entry written long ago, or be evicted before it, depending only
//! on which instant is smaller. This is a property of ordering both concerns
//! with one heap.
//!
//! ## Locking
//!
//! Every operation holds the state lock for its duration and releases it
//! before any event is delivered, so subscribers may call back into the cache.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::ds::{ExpiryItem, HeapItem, PriorityHeap, SlotId};
use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Longest TTL accepted; larger values are clamped.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Smallest sweep interval derived from a default TTL.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of monotonic time for expiry decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stratacache::policy::ttl::{ManualClock, SweepMode, TtlCache};
/// use stratacache::traits::Cache;
///
/// let clock = ManualClock::new();
/// let mut cache = TtlCache::with_clock(4, Duration::from_secs(10), clock.clone(), SweepMode::Disabled);
/// cache.set("k", 1).unwrap();
///
/// clock.advance(Duration::from_secs(9));
/// assert_eq!(cache.get(&"k").unwrap(), 1);
/// clock.advance(Duration::from_secs(1));
/// assert!(cache.get(&"k").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Background sweep configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Sweep on a dedicated thread at this interval.
    Interval(Duration),
    /// Expire lazily only (plus explicit [`TtlCache::sweep_expired`] calls).
    Disabled,
}

impl SweepMode {
    /// Half of `default_ttl`, but never below one millisecond.
    pub fn for_ttl(default_ttl: Duration) -> Self {
        Self::Interval((default_ttl / 2).max(MIN_SWEEP_INTERVAL))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct TtlState<K, V> {
    index: FxHashMap<K, SlotId>,
    heap: PriorityHeap<ExpiryItem<K, V>>,
    capacity: usize,
}

impl<K, V> TtlState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn remove_id(&mut self, id: SlotId) -> Option<(K, V)> {
        let index = self.heap.get(id)?.index();
        let (key, value) = self.heap.remove(index)?.into_entry();
        self.index.remove(&key);
        Some((key, value))
    }

    /// Pops every item whose expiry is at or before `now`.
    fn pop_expired(&mut self, now: Instant) -> Vec<(K, V)> {
        let mut expired = Vec::new();
        while self.heap.peek().is_some_and(|top| top.priority() <= now) {
            if let Some(item) = self.heap.pop_min() {
                let (key, value) = item.into_entry();
                self.index.remove(&key);
                expired.push((key, value));
            }
        }
        expired
    }
}

struct Shared<K, V> {
    state: Mutex<TtlState<K, V>>,
    events: EventBus<K, V>,
    clock: Arc<dyn Clock>,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn notify_evicted(&self, evicted: Vec<(K, V)>) {
        for (key, value) in evicted {
            self.events.emit(&Event::eviction(key, value));
        }
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let expired = self.state.lock().pop_expired(now);
        let count = expired.len();
        if count > 0 {
            trace!(expired = count, "ttl sweep evicted entries");
        }
        self.notify_evicted(expired);
        count
    }

    fn get(&self, key: &K) -> CacheResult<V> {
        let now = self.clock.now();
        let (result, evicted) = {
            let mut state = self.state.lock();
            let &id = state.index.get(key).ok_or(CacheError::NotFound)?;
            let item = state.heap.get(id).ok_or(CacheError::NotFound)?;
            if now < item.priority() {
                (Ok(item.value().clone()), None)
            } else {
                (Err(CacheError::NotFound), state.remove_id(id))
            }
        };
        self.notify_evicted(evicted.into_iter().collect());
        result
    }

    fn set(&self, key: K, value: V, ttl: Duration) {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl);
        let evicted = {
            let mut state = self.state.lock();
            if let Some(&id) = state.index.get(&key) {
                if let Some(item) = state.heap.get_mut(id) {
                    let index = item.index();
                    item.set_value(value);
                    item.set_priority(expires_at);
                    state.heap.fix(index);
                }
                None
            } else {
                let evicted = if state.index.len() >= state.capacity {
                    state.heap.pop_min().map(|item| {
                        let (k, v) = item.into_entry();
                        state.index.remove(&k);
                        (k, v)
                    })
                } else {
                    None
                };
                let id = state
                    .heap
                    .push(ExpiryItem::new(key.clone(), value, expires_at));
                state.index.insert(key, id);
                evicted
            }
        };
        self.notify_evicted(evicted.into_iter().collect());
    }

    fn delete(&self, key: &K) -> CacheResult<()> {
        let now = self.clock.now();
        let expired = {
            let mut state = self.state.lock();
            let &id = state.index.get(key).ok_or(CacheError::NotFound)?;
            let expired = state.heap.get(id).is_some_and(|item| now >= item.priority());
            let removed = state.remove_id(id);
            if expired { removed } else { None }
        };
        match expired {
            Some(entry) => {
                self.notify_evicted(vec![entry]);
                Err(CacheError::NotFound)
            },
            None => Ok(()),
        }
    }

    fn live_entries(&self) -> Vec<(K, V)> {
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .heap
            .iter()
            .filter(|item| now < item.priority())
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }
}

fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Owns the sweeper thread; dropping it stops and joins the thread.
struct Sweeper {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    fn spawn<K, V>(shared: Arc<Shared<K, V>>, interval: Duration) -> Option<Self>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        let signal = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = Arc::clone(&signal);

        let spawned = thread::Builder::new()
            .name("stratacache-ttl-sweeper".into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "ttl sweeper started");
                loop {
                    {
                        let mut stopped = thread_signal.stopped.lock();
                        if !*stopped {
                            thread_signal.wake.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    shared.sweep();
                }
                debug!("ttl sweeper stopped");
            });

        match spawned {
            Ok(handle) => Some(Self {
                signal,
                handle: Some(handle),
            }),
            Err(err) => {
                warn!(error = %err, "failed to spawn ttl sweeper; expiring lazily only");
                None
            },
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("ttl sweeper thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

/// Bounded cache whose entries expire after a time-to-live.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stratacache::policy::ttl::TtlCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = TtlCache::new(16, Duration::from_secs(60));
/// cache.set("session", 42).unwrap();
/// cache.set_with_ttl("flash", 7, Duration::from_millis(1)).unwrap();
///
/// std::thread::sleep(Duration::from_millis(5));
/// assert_eq!(cache.get(&"session").unwrap(), 42);
/// assert!(cache.get(&"flash").is_err());
/// ```
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
    default_ttl: Duration,
    sweeper: Option<Sweeper>,
}

impl<K, V> TtlCache<K, V> {
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Whether a background sweeper thread is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_some()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a cache on the monotonic clock with a background sweeper
    /// running at half of `default_ttl`. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self::with_clock(
            capacity,
            default_ttl,
            MonotonicClock,
            SweepMode::for_ttl(default_ttl),
        )
    }

    /// Creates a cache with an explicit clock and sweep mode.
    pub fn with_clock<C: Clock>(
        capacity: usize,
        default_ttl: Duration,
        clock: C,
        sweep: SweepMode,
    ) -> Self {
        let capacity = capacity.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(TtlState {
                index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
                heap: PriorityHeap::with_capacity(capacity),
                capacity,
            }),
            events: EventBus::new(),
            clock: Arc::new(clock),
        });
        let sweeper = match sweep {
            SweepMode::Interval(interval) => Sweeper::spawn(Arc::clone(&shared), interval),
            SweepMode::Disabled => None,
        };
        Self {
            shared,
            default_ttl,
            sweeper,
        }
    }

    /// Inserts with a TTL that overrides the cache default for this entry.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.shared.set(key, value, ttl);
        Ok(())
    }

    /// Time left before `key` expires; `None` if absent or already expired.
    pub fn time_to_live(&self, key: &K) -> Option<Duration> {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        let &id = state.index.get(key)?;
        let expires_at = state.heap.get(id)?.priority();
        expires_at.checked_duration_since(now).filter(|d| !d.is_zero())
    }

    /// Runs one sweep batch on the calling thread; returns the number evicted.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let state = self.shared.state.lock();
        assert_eq!(state.index.len(), state.heap.len());
        assert!(state.index.len() <= state.capacity);
        for (key, &id) in &state.index {
            let item = state.heap.get(id).expect("indexed heap item missing");
            assert!(item.key() == key, "index points at wrong item");
        }
        state.heap.debug_validate_invariants();
    }
}

impl<K, V> Cache<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        self.shared.get(key)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        self.shared.set(key, value, self.default_ttl);
        Ok(())
    }

    /// Deleting an entry that has already expired evicts it and reports
    /// `NotFound`, as if the sweeper had got there first.
    fn delete(&mut self, key: &K) -> CacheResult<()> {
        self.shared.delete(key)
    }

    fn clear(&mut self) {
        let mut state = self.shared.state.lock();
        state.index.clear();
        state.heap.clear();
    }

    /// Resident entries, including expired ones not yet swept.
    fn len(&self) -> usize {
        self.shared.state.lock().index.len()
    }

    fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }
}

impl<K, V> IterableCache<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Visits a copy of the unexpired entries taken under the lock.
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.shared.live_entries() {
            if !visit(&k, &v) {
                break;
            }
        }
    }
}

impl<K, V> ObservableCache<K, V> for TtlCache<K, V> {
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback);
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TtlCache")
            .field("len", &state.index.len())
            .field("capacity", &state.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("sweeping", &self.sweeper.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manual(capacity: usize, ttl_ms: u64) -> (TtlCache<&'static str, i32>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(
            capacity,
            Duration::from_millis(ttl_ms),
            clock.clone(),
            SweepMode::Disabled,
        );
        (cache, clock)
    }

    fn count_evictions<K: 'static, V: 'static>(cache: &TtlCache<K, V>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        cache.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn ttl_get_expires_exactly_at_deadline() {
        let (mut cache, clock) = manual(4, 100);
        let evictions = count_evictions(&cache);
        cache.set("a", 1).unwrap();

        clock.advance(Duration::from_millis(99));
        assert_eq!(cache.get(&"a").unwrap(), 1);
        assert_eq!(cache.time_to_live(&"a"), Some(Duration::from_millis(1)));

        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&"a").unwrap_err().is_not_found());
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 0);
        cache.debug_validate_invariants();
    }

    #[test]
    fn ttl_set_with_ttl_overrides_default() {
        let (mut cache, clock) = manual(4, 1_000);
        cache.set("long", 1).unwrap();
        cache.set_with_ttl("short", 2, Duration::from_millis(10)).unwrap();

        clock.advance(Duration::from_millis(10));
        assert!(cache.get(&"short").is_err());
        assert_eq!(cache.get(&"long").unwrap(), 1);
    }

    #[test]
    fn ttl_set_existing_resets_expiry() {
        let (mut cache, clock) = manual(2, 100);
        cache.set("a", 1).unwrap();
        clock.advance(Duration::from_millis(80));
        cache.set("a", 2).unwrap();
        clock.advance(Duration::from_millis(80));
        assert_eq!(cache.get(&"a").unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ttl_capacity_evicts_earliest_expiry_not_oldest_insert() {
        let (mut cache, clock) = manual(2, 1_000);
        cache.set_with_ttl("old_long", 1, Duration::from_secs(60)).unwrap();
        clock.advance(Duration::from_millis(5));
        cache.set_with_ttl("new_short", 2, Duration::from_millis(50)).unwrap();
        cache.set("third", 3).unwrap();

        assert!(cache.get(&"new_short").is_err());
        assert_eq!(cache.get(&"old_long").unwrap(), 1);
        assert_eq!(cache.get(&"third").unwrap(), 3);
        cache.debug_validate_invariants();
    }

    #[test]
    fn ttl_sweep_stops_at_first_live_item() {
        let (mut cache, clock) = manual(8, 100);
        let evictions = count_evictions(&cache);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.set_with_ttl("c", 3, Duration::from_secs(10)).unwrap();

        clock.advance(Duration::from_millis(150));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(evictions.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep_expired(), 0);
        cache.debug_validate_invariants();
    }

    #[test]
    fn ttl_delete_of_expired_entry_is_not_found() {
        let (mut cache, clock) = manual(2, 10);
        let evictions = count_evictions(&cache);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.delete(&"b").unwrap();

        clock.advance(Duration::from_millis(10));
        assert!(cache.delete(&"a").unwrap_err().is_not_found());
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn ttl_range_skips_expired_entries() {
        let (mut cache, clock) = manual(4, 100);
        cache.set("a", 1).unwrap();
        cache.set_with_ttl("b", 2, Duration::from_secs(5)).unwrap();
        clock.advance(Duration::from_millis(100));

        let mut seen = Vec::new();
        cache.range(&mut |k, v| {
            seen.push((*k, *v));
            true
        });
        assert_eq!(seen, vec![("b", 2)]);
        // Expired-but-unswept entries still count as resident.
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn ttl_subscriber_may_reenter_cache_during_eviction() {
        let (mut cache, clock) = manual(4, 10);
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();

        let cache = Arc::new(cache);
        let observed_len = Arc::new(Mutex::new(Vec::new()));
        {
            let weak = Arc::downgrade(&cache);
            let observed_len = Arc::clone(&observed_len);
            cache.on_event(move |_| {
                // Would deadlock if the state lock were held during delivery.
                if let Some(cache) = weak.upgrade() {
                    observed_len.lock().push(cache.len());
                }
            });
        }

        clock.advance(Duration::from_millis(10));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(*observed_len.lock(), vec![0, 0]);
    }

    #[test]
    fn ttl_clear_drops_without_events() {
        let (mut cache, _clock) = manual(4, 100);
        let evictions = count_evictions(&cache);
        cache.set("a", 1).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(evictions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ttl_background_sweeper_evicts_without_reads() {
        let clock = ManualClock::new();
        let cache: TtlCache<u32, u32> = TtlCache::with_clock(
            4,
            Duration::from_millis(50),
            clock.clone(),
            SweepMode::Interval(Duration::from_millis(5)),
        );
        assert!(cache.is_sweeping());
        let evictions = count_evictions(&cache);

        let mut cache = cache;
        cache.set(1, 1).unwrap();
        clock.advance(Duration::from_millis(50));

        let deadline = Instant::now() + Duration::from_secs(2);
        while cache.len() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.len(), 0);
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ttl_sweep_interval_defaults_to_half_ttl() {
        assert_eq!(
            SweepMode::for_ttl(Duration::from_millis(100)),
            SweepMode::Interval(Duration::from_millis(50))
        );
        assert_eq!(
            SweepMode::for_ttl(Duration::ZERO),
            SweepMode::Interval(MIN_SWEEP_INTERVAL)
        );
    }
}
