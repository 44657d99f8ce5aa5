pub mod bloom;
pub mod ghost_list;
pub mod intrusive_list;
pub mod priority_heap;
pub mod slot_arena;

pub use bloom::BloomFilter;
pub use ghost_list::GhostList;
pub use intrusive_list::IntrusiveList;
pub use priority_heap::{ExpiryItem, FrequencyItem, HeapEntry, HeapItem, PriorityHeap};
pub use slot_arena::{SlotArena, SlotId};
