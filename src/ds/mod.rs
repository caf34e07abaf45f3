pub mod recency;
pub mod slot_arena;

pub use recency::{CacheEntry, RecencyIndex};
pub use slot_arena::{SlotArena, SlotId};
