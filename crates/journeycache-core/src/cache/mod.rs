//! Local caching of journey data.
//!
//! This module provides the `CacheStore` trait with a file-backed and an
//! in-memory implementation, and the staleness policy deciding when a cached
//! entry must be re-fetched. A single `CacheEntry` (overview, stages,
//! last-updated timestamp) is persisted under one key and is always replaced
//! as a whole.

pub mod staleness;
pub mod store;

pub use staleness::{is_stale, DEFAULT_TTL_MINUTES};
pub use store::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore, CACHE_KEY};
