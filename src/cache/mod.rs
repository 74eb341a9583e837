//! Time-bounded response cache.
//!
//! Responses are stored under a fingerprint of the request that produced
//! them, together with an expiry timestamp:
//! - Unexpired entries are served without touching the network
//! - Expired entries are removed on read and refetched
//! - Failed fetches are never written
//! - The whole store can be cleared on demand

mod layer;
mod storage;
mod traits;

pub use layer::{ResponseCache, DEFAULT_TTL_MINUTES};
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource, Clock, ManualClock, SystemClock};
