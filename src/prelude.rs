pub use crate::builder::{CacheBuilder, CacheFactory, CachePolicy, PolicyCache};
#[cfg(feature = "json")]
pub use crate::decorator::JsonSerializer;
pub use crate::decorator::{
    AtomicCollector, BloomCache, Collector, CompressedCache, FilterView, LoggingCache, MapView,
    MetricsCache, MetricsSnapshot, filter_snapshot, map_snapshot, reduce, snapshot,
};
pub use crate::ds::{BloomFilter, GhostList, IntrusiveList, PriorityHeap, SlotArena, SlotId};
pub use crate::error::{CacheError, CacheResult, ConfigError};
pub use crate::event::{Event, EventBus, EventKind};
pub use crate::policy::{
    ArcCache, Clock, FifoCache, LfuCache, LruCache, ManualClock, MonotonicClock, SweepMode,
    TtlCache,
};
pub use crate::traits::{Cache, IterableCache, ObservableCache, ProbabilisticSet, Serializer};
