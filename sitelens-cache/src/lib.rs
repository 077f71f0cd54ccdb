//! SiteLens Cache - Result Cache and Cache Keys
//!
//! Holds completed analysis results keyed by a canonical digest of the
//! request. The cache is synchronous and never awaits while locked, so it can
//! be shared freely between tokio tasks behind an `Arc`.

pub mod cache;

pub use cache::{CacheEntry, CacheKey, CacheStats, EntryStats, ResultCache, KEY_PREFIX_LEN};
