//! stratacache: generic in-memory caches with pluggable eviction strategies
//! and stackable decorators.
//!
//! ```text
//!   builder ──► policy::{Fifo, Lru, Lfu, Ttl, Arc}Cache ──► ds (lists, heap, ghosts)
//!                     ▲
//!   decorator::{Logging, Metrics, Bloom, Compressed, MapView, FilterView}
//! ```
//!
//! Every cache speaks the contracts in [`traits`]; events flow through
//! [`event::EventBus`].

pub mod builder;
pub mod decorator;
pub mod ds;
pub mod error;
pub mod event;
pub mod policy;
pub mod prelude;
pub mod traits;
