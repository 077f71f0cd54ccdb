//! Read-only cache statistics.

use serde::{Deserialize, Serialize};

/// Snapshot of a single cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    /// Short key prefix, never the full key.
    pub key_prefix: String,
    /// Milliseconds since the entry was created.
    pub age_ms: u64,
    /// Milliseconds since the entry was last read or written.
    pub idle_ms: u64,
    /// Number of cache hits served by this entry.
    pub access_count: u64,
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries currently in cache.
    pub size: usize,
    /// Capacity before LRU eviction.
    pub max_size: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (expired reads included).
    pub misses: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Per-entry details, most recently used first.
    pub entries: Vec<EntryStats>,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
