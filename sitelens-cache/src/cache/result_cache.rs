//! Bounded result cache with LRU eviction and TTL expiry.
//!
//! Entries are created only by [`ResultCache::put`] and mutated only by the
//! access bookkeeping in [`ResultCache::get`]. An entry is stale once
//! `now - created_at > ttl`; stale entries are never returned and are removed
//! on the read that finds them or by [`ResultCache::purge_expired`].

use super::key::CacheKey;
use super::stats::{CacheStats, EntryStats};
use lru::LruCache;
use sitelens_core::{
    elapsed_between, ConfigError, SharedClock, SiteLensResult, StateError, Timestamp,
};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A cached value with its access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub value: V,
    pub created_at: Timestamp,
    /// Never earlier than `created_at`.
    pub last_accessed_at: Timestamp,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        elapsed_between(self.created_at, now) > ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

struct CacheState<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    counters: Counters,
}

/// Bounded LRU + TTL cache, safe to share between tasks.
///
/// Recency order in the underlying [`LruCache`] follows `last_accessed_at`,
/// so popping the LRU end always removes the entry with the oldest access.
pub struct ResultCache<V> {
    state: Mutex<CacheState<V>>,
    max_size: NonZeroUsize,
    ttl: Duration,
    clock: SharedClock,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache holding at most `max_size` entries for `ttl` each.
    pub fn new(max_size: usize, ttl: Duration, clock: SharedClock) -> SiteLensResult<Self> {
        let capacity = NonZeroUsize::new(max_size).ok_or_else(|| ConfigError::InvalidValue {
            field: "cache_max_size".to_string(),
            value: max_size.to_string(),
            reason: "cache_max_size must be greater than 0".to_string(),
        })?;

        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                counters: Counters::default(),
            }),
            max_size: capacity,
            ttl,
            clock,
        })
    }

    fn lock(&self) -> SiteLensResult<MutexGuard<'_, CacheState<V>>> {
        self.state
            .lock()
            .map_err(|_| StateError::lock_poisoned("result cache").into())
    }

    /// Look up a fresh entry.
    ///
    /// A hit refreshes `last_accessed_at` and bumps `access_count`. An
    /// expired entry is removed and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> SiteLensResult<Option<V>> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let expired = match state.entries.peek(key) {
            None => {
                state.counters.misses += 1;
                return Ok(None);
            }
            Some(entry) => entry.is_expired(now, self.ttl),
        };

        if expired {
            state.entries.pop(key);
            state.counters.expirations += 1;
            state.counters.misses += 1;
            tracing::debug!(key_prefix = %key.prefix(), "Expired cache entry removed on read");
            return Ok(None);
        }

        state.counters.hits += 1;
        let value = state.entries.get_mut(key).map(|entry| {
            entry.last_accessed_at = now.max(entry.created_at);
            entry.access_count += 1;
            entry.value.clone()
        });
        Ok(value)
    }

    /// Insert or replace a value.
    ///
    /// When a new key arrives at capacity, the least recently accessed entry
    /// is evicted first and its key returned. `len() <= max_size()` holds
    /// when this returns.
    pub fn put(&self, key: CacheKey, value: V) -> SiteLensResult<Option<CacheKey>> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let mut evicted = None;
        if !state.entries.contains(&key) && state.entries.len() >= self.max_size.get() {
            if let Some((old_key, _)) = state.entries.pop_lru() {
                state.counters.evictions += 1;
                tracing::debug!(
                    evicted_prefix = %old_key.prefix(),
                    size = state.entries.len(),
                    "Evicted least recently used cache entry"
                );
                evicted = Some(old_key);
            }
        }

        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        };
        state.entries.put(key, entry);

        debug_assert!(state.entries.len() <= self.max_size.get());
        Ok(evicted)
    }

    /// Remove every entry whose TTL has elapsed.
    pub fn purge_expired(&self) -> SiteLensResult<usize> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        state.counters.expirations += expired.len() as u64;
        Ok(expired.len())
    }

    /// Remove everything. Returns the number of entries removed.
    pub fn clear(&self) -> SiteLensResult<usize> {
        let mut state = self.lock()?;
        let count = state.entries.len();
        state.entries.clear();
        Ok(count)
    }

    /// Current number of entries (0 if the lock is poisoned).
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity before LRU eviction.
    pub fn max_size(&self) -> usize {
        self.max_size.get()
    }

    /// Maximum entry age.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot of counters and entries. Does not touch access bookkeeping.
    pub fn stats(&self) -> SiteLensResult<CacheStats> {
        let now = self.clock.now();
        let state = self.lock()?;

        let entries = state
            .entries
            .iter()
            .map(|(key, entry)| EntryStats {
                key_prefix: key.prefix().to_string(),
                age_ms: elapsed_between(entry.created_at, now).as_millis() as u64,
                idle_ms: elapsed_between(entry.last_accessed_at, now).as_millis() as u64,
                access_count: entry.access_count,
            })
            .collect();

        Ok(CacheStats {
            size: state.entries.len(),
            max_size: self.max_size.get(),
            hits: state.counters.hits,
            misses: state.counters.misses,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            entries,
        })
    }
}

impl<V> std::fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .finish()
    }
}
