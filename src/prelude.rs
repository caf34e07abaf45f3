pub use crate::builder::MemoryCacheBuilder;
pub use crate::cache::{CacheCallback, MemoryCache};
pub use crate::ds::{CacheEntry, RecencyIndex, SlotArena, SlotId};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::release::{MainThreadQueue, ReleaseBatch};
