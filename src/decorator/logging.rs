//! `tracing` instrumentation around any cache.
//!
//! Every call is logged at `debug` with `cache`, `op`, `key` and `outcome`
//! fields. Failures other than `NotFound` are also logged at `warn`. Results
//! are returned unchanged.

use std::borrow::Cow;
use std::fmt;

use tracing::{Level, debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::event::Event;
use crate::traits::{Cache, IterableCache, ObservableCache};

/// Decorator tracing each call to the wrapped cache.
pub struct LoggingCache<C> {
    inner: C,
    name: Cow<'static, str>,
}

impl<C> LoggingCache<C> {
    /// Labels log lines with the inner cache's type name.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            name: Cow::Borrowed(std::any::type_name::<C>()),
        }
    }

    pub fn named(inner: C, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn record<T>(&self, op: &'static str, key: &dyn fmt::Debug, result: &CacheResult<T>) {
        let cache = &*self.name;
        match result {
            Ok(_) => debug!(cache, op, key = ?key, outcome = "ok", "cache call"),
            Err(CacheError::NotFound) => {
                debug!(cache, op, key = ?key, outcome = "not_found", "cache call")
            },
            Err(err) => {
                debug!(cache, op, key = ?key, outcome = "error", "cache call");
                warn!(cache, op, key = ?key, error = %err, "cache call failed");
            },
        }
    }
}

impl<C, K, V> Cache<K, V> for LoggingCache<C>
where
    C: Cache<K, V>,
    K: fmt::Debug,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let result = self.inner.get(key);
        self.record("get", key, &result);
        result
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        // The key moves into the inner cache, so its text is taken up front,
        // but only when a debug line will actually be written.
        let label = tracing::enabled!(Level::DEBUG).then(|| format!("{key:?}"));
        let result = self.inner.set(key, value);
        match label {
            Some(label) => self.record("set", &format_args!("{label}"), &result),
            None => match &result {
                Err(err) if !err.is_not_found() => {
                    warn!(cache = &*self.name, op = "set", error = %err, "cache call failed")
                },
                _ => {},
            },
        }
        result
    }

    fn delete(&mut self, key: &K) -> CacheResult<()> {
        let result = self.inner.delete(key);
        self.record("delete", key, &result);
        result
    }

    fn clear(&mut self) {
        self.inner.clear();
        debug!(cache = &*self.name, op = "clear", outcome = "ok", "cache call");
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<C, K, V> IterableCache<K, V> for LoggingCache<C>
where
    C: IterableCache<K, V>,
    K: fmt::Debug,
{
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let mut visited = 0usize;
        self.inner.range(&mut |key, value| {
            visited += 1;
            visit(key, value)
        });
        debug!(cache = &*self.name, op = "range", visited, "cache call");
    }
}

impl<C, K, V> ObservableCache<K, V> for LoggingCache<C>
where
    C: ObservableCache<K, V>,
{
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.inner.on_event(callback);
    }
}

impl<C: fmt::Debug> fmt::Debug for LoggingCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingCache")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::functional::FilterView;
    use crate::policy::lru::LruCache;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Debug, Clone, PartialEq)]
    struct Captured {
        level: Level,
        op: String,
        outcome: Option<String>,
    }

    #[derive(Clone, Default)]
    struct CaptureLayer {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    #[derive(Default)]
    struct FieldVisitor {
        op: String,
        outcome: Option<String>,
    }

    impl Visit for FieldVisitor {
        fn record_str(&mut self, field: &Field, value: &str) {
            match field.name() {
                "op" => self.op = value.to_string(),
                "outcome" => self.outcome = Some(value.to_string()),
                _ => {},
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            self.events.lock().push(Captured {
                level: *event.metadata().level(),
                op: visitor.op,
                outcome: visitor.outcome,
            });
        }
    }

    fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Captured>) {
        capture_at(LevelFilter::TRACE, f)
    }

    fn capture_at<R>(max: LevelFilter, f: impl FnOnce() -> R) -> (R, Vec<Captured>) {
        let layer = CaptureLayer::default();
        let events = Arc::clone(&layer.events);
        let subscriber = tracing_subscriber::registry().with(max).with(layer);
        let out = tracing::subscriber::with_default(subscriber, f);
        let captured = events.lock().clone();
        (out, captured)
    }

    static KEYS_FORMATTED: AtomicUsize = AtomicUsize::new(0);

    /// Key whose `Debug` output is counted.
    #[derive(Clone, PartialEq, Eq, Hash)]
    struct CountedKey(u32);

    impl fmt::Debug for CountedKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            KEYS_FORMATTED.fetch_add(1, Ordering::SeqCst);
            write!(f, "key-{}", self.0)
        }
    }

    #[test]
    fn logging_passes_results_through() {
        let mut cache = LoggingCache::named(LruCache::new(2), "sessions");
        assert_eq!(cache.name(), "sessions");
        cache.set("a", 1).unwrap();
        assert_eq!(cache.get(&"a").unwrap(), 1);
        assert!(cache.get(&"b").unwrap_err().is_not_found());
        assert!(cache.delete(&"b").unwrap_err().is_not_found());
    }

    #[test]
    fn logging_records_each_call_at_debug() {
        let (_, events) = capture(|| {
            let mut cache = LoggingCache::new(LruCache::new(2));
            cache.set(1, 1).unwrap();
            let _ = cache.get(&2);
            cache.clear();
        });
        let ops: Vec<_> = events
            .iter()
            .map(|e| (e.level, e.op.as_str(), e.outcome.as_deref()))
            .collect();
        assert_eq!(
            ops,
            vec![
                (Level::DEBUG, "set", Some("ok")),
                (Level::DEBUG, "get", Some("not_found")),
                (Level::DEBUG, "clear", Some("ok")),
            ]
        );
    }

    #[test]
    fn logging_warns_on_real_failures_only() {
        let (result, events) = capture(|| {
            let mut cache = LoggingCache::new(FilterView::new(LruCache::new(2), |v: &i32| *v > 0));
            cache.set("neg", -1)
        });
        assert!(matches!(result, Err(CacheError::FilteredOut)));
        assert!(
            events
                .iter()
                .any(|e| e.level == Level::WARN && e.op == "set")
        );
    }

    #[test]
    fn logging_set_skips_key_text_when_debug_is_off() {
        let (_, events) = capture_at(LevelFilter::WARN, || {
            let mut cache = LoggingCache::new(LruCache::new(2));
            for i in 0..3 {
                cache.set(CountedKey(i), i).unwrap();
            }
        });
        assert!(events.is_empty());
        assert_eq!(KEYS_FORMATTED.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn logging_set_still_warns_when_debug_is_off() {
        let (result, events) = capture_at(LevelFilter::WARN, || {
            let mut cache = LoggingCache::new(FilterView::new(LruCache::new(2), |v: &i32| *v > 0));
            cache.set("neg", -1)
        });
        assert!(matches!(result, Err(CacheError::FilteredOut)));
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].level, events[0].op.as_str()), (Level::WARN, "set"));
    }

    #[test]
    fn logging_forwards_range() {
        let mut cache = LoggingCache::new(LruCache::new(4));
        cache.set(1, "x").unwrap();
        cache.set(2, "y").unwrap();
        let mut n = 0;
        cache.range(&mut |_, _| {
            n += 1;
            true
        });
        assert_eq!(n, 2);
    }
}
