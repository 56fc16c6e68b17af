//! Generic caching layer shared by the tracker components.
//!
//! This module provides:
//! - A pluggable key-value storage with per-entry expiry (memory, SQLite, none)
//! - Namespaced, typed access on top of any storage
//! - A single-flight `worker` that runs a producer at most once per key and
//!   memoizes its result

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{Cacheable, WorkerSpec};
