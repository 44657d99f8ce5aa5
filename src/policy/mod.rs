//! Eviction strategies.
//!
//! | Strategy | Evicts                              | Backing structure                 |
//! |----------|-------------------------------------|-----------------------------------|
//! | FIFO     | oldest insertion                    | `IntrusiveList` + index           |
//! | LRU      | least recently read or written      | `IntrusiveList` + index           |
//! | LFU      | lowest access count                 | `PriorityHeap<FrequencyItem>`     |
//! | TTL      | earliest expiry (and expired keys)  | `PriorityHeap<ExpiryItem>` + lock |
//! | ARC      | adaptive split of recency/frequency | two lists + two `GhostList`s      |
//!
//! Only [`ttl::TtlCache`] synchronizes internally; the others expect a single
//! writer or an external lock.

pub mod arc;
pub mod fifo;
pub mod lfu;
pub mod lru;
pub mod ttl;

pub use arc::ArcCache;
pub use fifo::FifoCache;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use ttl::{Clock, ManualClock, MonotonicClock, SweepMode, TtlCache};
