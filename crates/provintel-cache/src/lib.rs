pub mod error;
pub mod memory;
pub mod sweeper;

pub use error::CacheError;
pub use memory::{CacheEntry, CacheStats, IntelligenceCache};
pub use sweeper::CacheSweeper;
