//! Serialize-then-gzip decorator.
//!
//! ## Payload
//!
//! ```text
//!   set(k, v):  v ──Serializer::encode──► raw bytes ──gzip──► blob ──► inner.set(k, blob)
//!                                          │                   │
//!                                   ReadBytes(len)     CompressBytes(len)
//!
//!   get(k):     inner.get(k) ──► blob ──gunzip──► raw bytes ──Serializer::decode──► v
//! ```
//!
//! The inner cache stores opaque `Vec<u8>` blobs under the original keys, so
//! any strategy can hold compressed values. When the inner cache is
//! observable, its evictions are relayed with the value decoded, either from
//! construction ([`CompressedCache::observing`]) or from the first
//! [`ObservableCache::on_event`] call. Codec failures surface as
//! [`CacheError::Serialization`], [`CacheError::Compression`] or
//! [`CacheError::Decompression`]; inner errors pass through unchanged.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::warn;

use crate::error::{CacheError, CacheResult};
use crate::event::{Event, EventBus};
use crate::traits::{Cache, IterableCache, ObservableCache, Serializer};

/// JSON codec backed by `serde_json`.
#[cfg(feature = "json")]
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

#[cfg(feature = "json")]
impl<V> Serializer<V> for JsonSerializer
where
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(&self, value: &V) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(CacheError::serialization)
    }

    fn decode(&self, bytes: &[u8]) -> CacheResult<V> {
        serde_json::from_slice(bytes).map_err(CacheError::serialization)
    }
}

/// Gzip-compresses `raw` at `level`.
pub fn compress(raw: &[u8], level: Compression) -> CacheResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), level);
    encoder.write_all(raw).map_err(CacheError::Compression)?;
    encoder.finish().map_err(CacheError::Compression)
}

/// Inflates a gzip stream produced by [`compress`].
pub fn decompress(blob: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(blob);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(CacheError::Decompression)?;
    Ok(raw)
}

fn decode_blob<S, V>(serializer: &S, blob: &[u8]) -> CacheResult<V>
where
    S: Serializer<V> + ?Sized,
{
    let raw = decompress(blob)?;
    serializer.decode(&raw)
}

/// Decorator storing values as compressed blobs in a byte-valued cache.
///
/// # Example
///
/// ```
/// # #[cfg(feature = "json")] {
/// use stratacache::decorator::compression::{CompressedCache, JsonSerializer};
/// use stratacache::policy::lru::LruCache;
/// use stratacache::traits::Cache;
///
/// let mut cache = CompressedCache::new(LruCache::new(8), JsonSerializer);
/// cache.set("greeting", "hello ".repeat(100)).unwrap();
/// assert_eq!(cache.get(&"greeting").unwrap(), "hello ".repeat(100));
/// # }
/// ```
pub struct CompressedCache<C, S, K, V> {
    inner: C,
    serializer: Arc<S>,
    level: Compression,
    events: EventBus<K, V>,
    relayed: AtomicBool,
}

impl<C, S, K, V> CompressedCache<C, S, K, V> {
    /// Wraps `inner` at the default gzip level.
    pub fn new(inner: C, serializer: S) -> Self {
        Self {
            inner,
            serializer: Arc::new(serializer),
            level: Compression::default(),
            events: EventBus::new(),
            relayed: AtomicBool::new(false),
        }
    }

    /// Wraps `inner` and relays its evictions with the value decoded on a
    /// best-effort basis (`None` if the blob does not decode).
    pub fn observing(inner: C, serializer: S) -> Self
    where
        C: ObservableCache<K, Vec<u8>>,
        S: Serializer<V> + Send + Sync + 'static,
        K: Clone + 'static,
        V: 'static,
    {
        let cache = Self::new(inner, serializer);
        cache.install_relay();
        cache
    }

    fn install_relay(&self)
    where
        C: ObservableCache<K, Vec<u8>>,
        S: Serializer<V> + Send + Sync + 'static,
        K: Clone + 'static,
        V: 'static,
    {
        if self.relayed.swap(true, Ordering::AcqRel) {
            return;
        }
        let relay_events = self.events.clone();
        let relay_serializer = Arc::clone(&self.serializer);
        self.inner.on_event(move |event: &Event<K, Vec<u8>>| {
            let decoded = event
                .clone()
                .map_value(|blob| decode_blob(&*relay_serializer, &blob).ok());
            relay_events.emit(&decoded);
        });
    }

    /// Sets the gzip level, clamped to `0..=9`.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Direct access to the blob store; writes here bypass encoding.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C, S, K, V> Cache<K, V> for CompressedCache<C, S, K, V>
where
    C: Cache<K, Vec<u8>>,
    S: Serializer<V>,
    K: Clone,
{
    fn get(&mut self, key: &K) -> CacheResult<V> {
        let blob = self.inner.get(key)?;
        decode_blob(&*self.serializer, &blob)
    }

    fn set(&mut self, key: K, value: V) -> CacheResult<()> {
        let raw = self.serializer.encode(&value)?;
        let observed = self.events.has_subscribers();
        if observed {
            self.events.emit(&Event::read_bytes(key.clone(), raw.len()));
        }

        let blob = compress(&raw, self.level)?;
        if observed {
            self.events
                .emit(&Event::compress_bytes(key.clone(), blob.len()));
        }

        self.inner.set(key, blob)
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

impl<C, S, K, V> IterableCache<K, V> for CompressedCache<C, S, K, V>
where
    C: IterableCache<K, Vec<u8>>,
    S: Serializer<V>,
    K: Clone,
{
    /// Visits decoded values; entries that fail to decode are skipped.
    fn range(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let serializer = &*self.serializer;
        let mut skipped = 0usize;
        self.inner.range(&mut |key, blob| match decode_blob(serializer, blob) {
            Ok(value) => visit(key, &value),
            Err(err) => {
                skipped += 1;
                warn!(error = %err, "skipping undecodable entry during range");
                true
            },
        });
        if skipped > 0 {
            warn!(skipped, "range finished with undecodable entries");
        }
    }
}

impl<C, S, K, V> ObservableCache<K, V> for CompressedCache<C, S, K, V>
where
    C: ObservableCache<K, Vec<u8>>,
    S: Serializer<V> + Send + Sync + 'static,
    K: Clone + 'static,
    V: 'static,
{
    fn on_event<F>(&self, callback: F)
    where
        F: Fn(&Event<K, V>) + Send + Sync + 'static,
    {
        self.install_relay();
        self.events.subscribe(callback);
    }
}

impl<C: fmt::Debug, S, K, V> fmt::Debug for CompressedCache<C, S, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedCache")
            .field("inner", &self.inner)
            .field("level", &self.level.level())
            .finish()
    }
}
