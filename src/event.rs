//! Cache events and the subscriber list that delivers them.
//!
//! Strategies emit [`EventKind::Eviction`] whenever they drop an entry by
//! policy. The compression decorator emits the two byte-accounting kinds and
//! the metrics decorator emits `Hit`/`Miss` from its own observations.
//!
//! ## Delivery
//!
//! ```text
//!   emit(event)
//!     │
//!     ├─ read-lock subscribers, clone the Vec<Arc<..>>, unlock
//!     │
//!     └─ for cb in snapshot { cb(&event) }   (caller's thread, in order)
//! ```
//!
//! Callbacks run after the lock is released, so a callback may subscribe
//! another callback without deadlocking; the new one only sees later events.
//! There is no unsubscribe.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Kind of a cache [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Hit,
    Miss,
    /// An entry was removed by capacity pressure or expiry.
    Eviction,
    /// Size of an encoded value before compression.
    ReadBytes,
    /// Size of an encoded value after compression.
    CompressBytes,
}

/// A single notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<K, V> {
    pub kind: EventKind,
    pub key: K,
    /// The evicted value for `Eviction`; `None` for the other kinds.
    pub value: Option<V>,
    /// Byte count for `ReadBytes`/`CompressBytes`, zero otherwise.
    pub size: usize,
}

impl<K, V> Event<K, V> {
    pub fn hit(key: K) -> Self {
        Self::bare(EventKind::Hit, key)
    }

    pub fn miss(key: K) -> Self {
        Self::bare(EventKind::Miss, key)
    }

    pub fn eviction(key: K, value: V) -> Self {
        Self {
            kind: EventKind::Eviction,
            key,
            value: Some(value),
            size: 0,
        }
    }

    pub fn read_bytes(key: K, size: usize) -> Self {
        Self {
            size,
            ..Self::bare(EventKind::ReadBytes, key)
        }
    }

    pub fn compress_bytes(key: K, size: usize) -> Self {
        Self {
            size,
            ..Self::bare(EventKind::CompressBytes, key)
        }
    }

    fn bare(kind: EventKind, key: K) -> Self {
        Self {
            kind,
            key,
            value: None,
            size: 0,
        }
    }

    /// Rebuilds the event with a transformed value, keeping kind/key/size.
    pub fn map_value<U>(self, f: impl FnOnce(V) -> Option<U>) -> Event<K, U> {
        Event {
            kind: self.kind,
            key: self.key,
            value: self.value.and_then(f),
            size: self.size,
        }
    }
}

/// Shared subscriber callback.
pub type EventCallback<K, V> = Arc<dyn Fn(&Event<K, V>) + Send + Sync>;

/// Ordered, append-only list of event subscribers.
///
/// Cloning an `EventBus` yields a handle to the same list, which is how
/// decorators hand their bus to a relay callback registered on the inner
/// cache.
pub struct EventBus<K, V> {
    subscribers: Arc<RwLock<Vec<EventCallback<K, V>>>>,
}

impl<K, V> EventBus<K, V> {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends `callback`; it stays registered for the life of the bus.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(callback));
    }

    /// Delivers `event` to every subscriber registered before this call.
    pub fn emit(&self, event: &Event<K, V>) {
        let snapshot: Vec<EventCallback<K, V>> = self.subscribers.read().clone();
        for callback in &snapshot {
            callback(event);
        }
    }

    /// Returns `true` if at least one subscriber is registered.
    ///
    /// Emitters check this first to avoid cloning keys for nobody.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for EventBus<K, V> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<K, V> Default for EventBus<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for EventBus<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn emit_runs_callbacks_in_subscription_order() {
        let bus: EventBus<&str, i32> = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.subscribe(move |event: &Event<&str, i32>| {
                log.lock().push((tag, event.key));
            });
        }

        bus.emit(&Event::eviction("a", 1));
        assert_eq!(
            *log.lock(),
            vec![("first", "a"), ("second", "a"), ("third", "a")]
        );
    }

    #[test]
    fn subscribing_during_emit_does_not_deadlock() {
        let bus: EventBus<u32, u32> = EventBus::new();
        let inner_bus = bus.clone();
        let late_calls = Arc::new(Mutex::new(0u32));
        let late = Arc::clone(&late_calls);

        bus.subscribe(move |_event| {
            let late = Arc::clone(&late);
            inner_bus.subscribe(move |_| *late.lock() += 1);
        });

        bus.emit(&Event::hit(1));
        // The subscriber added during the first emit did not see it.
        assert_eq!(*late_calls.lock(), 0);
        assert_eq!(bus.len(), 2);

        bus.emit(&Event::hit(2));
        assert_eq!(*late_calls.lock(), 1);
    }

    #[test]
    fn constructors_fill_expected_fields() {
        let e: Event<&str, i32> = Event::read_bytes("k", 42);
        assert_eq!(e.kind, EventKind::ReadBytes);
        assert_eq!(e.size, 42);
        assert!(e.value.is_none());

        let e: Event<&str, i32> = Event::eviction("k", 7);
        assert_eq!(e.value, Some(7));

        let mapped = e.map_value(|v| Some(v * 2));
        assert_eq!(mapped.value, Some(14));
        assert_eq!(mapped.kind, EventKind::Eviction);
    }

    #[test]
    fn has_subscribers_tracks_registration() {
        let bus: EventBus<u8, u8> = EventBus::default();
        assert!(!bus.has_subscribers());
        assert!(bus.is_empty());
        bus.subscribe(|_| {});
        assert!(bus.has_subscribers());
    }
}
