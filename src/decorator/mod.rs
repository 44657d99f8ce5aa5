//! Decorators that wrap one inner cache and add a single concern.
//!
//! ```text
//!   LoggingCache<MetricsCache<BloomCache<LruCache<K, V>, BloomFilter, K, V>, K, V>>
//!        │             │              │
//!        │             │              └─ skips the inner get on a definite miss
//!        │             └─ counts hits, misses, evictions
//!        └─ traces every call
//! ```
//!
//! Each decorator implements [`Cache`](crate::traits::Cache) and forwards
//! [`IterableCache`](crate::traits::IterableCache) and
//! [`ObservableCache`](crate::traits::ObservableCache) when the wrapped cache
//! has them. Metrics, compression and bloom keep their own subscriber list
//! and relay inner events into it. The relay is registered on the inner
//! cache once, either at construction or on the first `on_event` call.

pub mod bloom;
pub mod compression;
pub mod functional;
pub mod logging;
pub mod metrics;

pub use bloom::BloomCache;
#[cfg(feature = "json")]
pub use compression::JsonSerializer;
pub use compression::CompressedCache;
pub use functional::{FilterView, MapView, filter_snapshot, map_snapshot, reduce, snapshot};
pub use logging::LoggingCache;
pub use metrics::{AtomicCollector, Collector, MetricsCache, MetricsSnapshot};
