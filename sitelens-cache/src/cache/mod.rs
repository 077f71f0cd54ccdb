//! Result cache with LRU eviction and TTL expiry.
//!
//! # Keys
//!
//! [`CacheKey`] cannot be built from an arbitrary string. It is always the
//! digest of a canonical request form, so `["b.com", "a.com"]` and
//! `["a.com", "b.com"]` share an entry.
//!
//! # Freshness
//!
//! Entries live for a fixed TTL measured from creation. Reads do not extend
//! the TTL; they only refresh the LRU position.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResultCache::new(100, Duration::from_secs(1800), system_clock())?;
//! let key = CacheKey::for_request(&request);
//! if let Some(report) = cache.get(&key)? {
//!     return Ok(report);
//! }
//! cache.put(key, report)?;
//! ```

pub mod key;
pub mod result_cache;
pub mod stats;

pub use key::{CacheKey, KEY_PREFIX_LEN};
pub use result_cache::{CacheEntry, ResultCache};
pub use stats::{CacheStats, EntryStats};
