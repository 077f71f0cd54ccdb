//! In-flight execution registry.
//!
//! Maps a cache key to the single execution currently producing its result.
//! The decision "no cached result and nothing in flight, so start a new
//! execution" is made in [`InFlightRegistry::claim`] while the registry lock
//! is held, which is what makes deduplication race-free.
//!
//! Entries are removed only through [`InFlightGuard`], which the execution
//! owns. Dropping the guard removes the entry whether the execution
//! succeeded, failed or panicked.

use crate::constants::REGISTRY_RESOURCE;
use futures_util::future::{BoxFuture, Shared};
use sitelens_cache::CacheKey;
use sitelens_core::{
    new_execution_id, ExecutionId, SharedClock, SiteLensResult, StateError, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Memoized handle to one execution. Every clone resolves to the same output.
pub type SharedExecution<T> = Shared<BoxFuture<'static, SiteLensResult<T>>>;

/// Registry entry for a running execution.
pub struct InFlightEntry<T: Clone> {
    pub key: CacheKey,
    pub execution_id: ExecutionId,
    pub started_at: Timestamp,
    handle: SharedExecution<T>,
}

impl<T: Clone> std::fmt::Debug for InFlightEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightEntry")
            .field("key_prefix", &self.key.prefix())
            .field("execution_id", &self.execution_id)
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Outcome of [`InFlightRegistry::claim`].
pub enum Claim<T: Clone> {
    /// A fresh cached value was found; nothing was registered.
    Cached(T),
    /// Another execution is already producing this key.
    Attached(SharedExecution<T>),
    /// A new execution was registered and started by the caller's closure.
    Started(SharedExecution<T>),
}

impl<T: Clone> std::fmt::Debug for Claim<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached(_) => f.write_str("Claim::Cached"),
            Self::Attached(_) => f.write_str("Claim::Attached"),
            Self::Started(_) => f.write_str("Claim::Started"),
        }
    }
}

/// At most one in-flight execution per key.
pub struct InFlightRegistry<T: Clone> {
    entries: Mutex<HashMap<CacheKey, InFlightEntry<T>>>,
    clock: SharedClock,
}

impl<T: Clone + Send + Sync + 'static> InFlightRegistry<T> {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> SiteLensResult<MutexGuard<'_, HashMap<CacheKey, InFlightEntry<T>>>> {
        self.entries
            .lock()
            .map_err(|_| StateError::lock_poisoned(REGISTRY_RESOURCE).into())
    }

    /// Resolve a key to a cached value, an existing execution, or a new one.
    ///
    /// `cached` is consulted while the registry lock is held. If it returns
    /// nothing and no entry exists, `start` receives the guard for the new
    /// entry and must return the shared handle of the execution that owns
    /// it. `start` must not block or touch this registry.
    pub fn claim<C, S>(
        self: &Arc<Self>,
        key: &CacheKey,
        cached: C,
        start: S,
    ) -> SiteLensResult<Claim<T>>
    where
        C: FnOnce() -> SiteLensResult<Option<T>>,
        S: FnOnce(InFlightGuard<T>) -> SharedExecution<T>,
    {
        let mut entries = self.lock()?;

        if let Some(value) = cached()? {
            return Ok(Claim::Cached(value));
        }

        if let Some(existing) = entries.get(key) {
            tracing::debug!(
                key_prefix = %key.prefix(),
                execution_id = %existing.execution_id,
                "Attaching to in-flight execution"
            );
            return Ok(Claim::Attached(existing.handle.clone()));
        }

        let execution_id = new_execution_id();
        let guard = InFlightGuard {
            registry: Arc::clone(self),
            key: key.clone(),
            execution_id,
        };
        let handle = start(guard);

        entries.insert(
            key.clone(),
            InFlightEntry {
                key: key.clone(),
                execution_id,
                started_at: self.clock.now(),
                handle: handle.clone(),
            },
        );
        tracing::debug!(
            key_prefix = %key.prefix(),
            execution_id = %execution_id,
            in_flight = entries.len(),
            "Registered in-flight execution"
        );

        Ok(Claim::Started(handle))
    }

    /// Number of executions currently registered (0 if the lock is poisoned).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a key has an execution in flight.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    /// Execution id registered for a key, if any.
    pub fn execution_id(&self, key: &CacheKey) -> Option<ExecutionId> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.get(key).map(|entry| entry.execution_id))
    }

    fn remove(&self, key: &CacheKey, execution_id: ExecutionId) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let owned = entries
            .get(key)
            .is_some_and(|entry| entry.execution_id == execution_id);
        if owned {
            entries.remove(key);
            tracing::debug!(
                key_prefix = %key.prefix(),
                execution_id = %execution_id,
                "Removed in-flight execution"
            );
        }
    }
}

impl<T: Clone> std::fmt::Debug for InFlightRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("InFlightRegistry").field("len", &len).finish()
    }
}

/// Removes its registry entry when dropped.
///
/// Removal is keyed by execution id, so a guard can never remove an entry
/// that a later execution registered under the same key.
pub struct InFlightGuard<T: Clone + Send + Sync + 'static> {
    registry: Arc<InFlightRegistry<T>>,
    key: CacheKey,
    execution_id: ExecutionId,
}

impl<T: Clone + Send + Sync + 'static> InFlightGuard<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        self.registry.remove(&self.key, self.execution_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use sitelens_core::{AnalysisKind, AnalysisOptions, ManualClock, UpstreamError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(name: &str) -> CacheKey {
        CacheKey::from_parts(AnalysisKind::Quick, &[name.to_string()], &AnalysisOptions::new())
    }

    fn registry() -> Arc<InFlightRegistry<u32>> {
        Arc::new(InFlightRegistry::new(Arc::new(ManualClock::starting_now())))
    }

    #[test]
    fn test_cached_value_short_circuits() {
        let registry = registry();
        let claim = registry
            .claim(&key("a.com"), || Ok(Some(7)), |_guard| unreachable!())
            .unwrap();
        assert!(matches!(claim, Claim::Cached(7)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_second_claim_attaches_to_first() {
        let registry = registry();
        let starts = AtomicUsize::new(0);
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();

        let first = registry
            .claim(&key("a.com"), || Ok(None), |guard| {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    let value = rx.await.unwrap_or(0);
                    drop(guard);
                    Ok(value)
                }
                .boxed()
                .shared()
            })
            .unwrap();
        let second = registry
            .claim(&key("a.com"), || Ok(None), |_guard| unreachable!())
            .unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        let (Claim::Started(first), Claim::Attached(second)) = (first, second) else {
            panic!("expected Started then Attached");
        };

        tx.send(42).unwrap();
        assert_eq!(first.await.unwrap(), 42);
        assert_eq!(second.await.unwrap(), 42);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_entry_removed() {
        let registry = registry();
        let claim = registry
            .claim(&key("a.com"), || Ok(None), |guard| {
                async move {
                    let _guard = guard;
                    Err(UpstreamError::EmptyResult.into())
                }
                .boxed()
                .shared()
            })
            .unwrap();
        let Claim::Started(handle) = claim else {
            panic!("expected Started");
        };
        let attached = handle.clone();

        assert!(handle.await.is_err());
        assert!(attached.await.is_err());
        assert!(!registry.contains(&key("a.com")));
    }

    #[test]
    fn test_dropping_guard_removes_entry() {
        let registry = registry();
        let mut held = None;
        registry
            .claim(&key("a.com"), || Ok(None), |guard| {
                held = Some(guard);
                futures_util::future::ready(Ok(1)).boxed().shared()
            })
            .unwrap();

        assert!(registry.contains(&key("a.com")));
        drop(held);
        assert!(!registry.contains(&key("a.com")));
    }

    #[test]
    fn test_stale_guard_does_not_remove_newer_entry() {
        let registry = registry();
        let mut old_guard = None;
        registry
            .claim(&key("a.com"), || Ok(None), |guard| {
                old_guard = Some(guard);
                futures_util::future::ready(Ok(1)).boxed().shared()
            })
            .unwrap();

        // Simulate the old entry being gone and a new execution registered.
        let old_id = old_guard.as_ref().map(|g| g.execution_id()).unwrap();
        registry.entries.lock().unwrap().clear();

        let mut new_guard = None;
        registry
            .claim(&key("a.com"), || Ok(None), |guard| {
                new_guard = Some(guard);
                futures_util::future::ready(Ok(2)).boxed().shared()
            })
            .unwrap();
        let new_id = registry.execution_id(&key("a.com")).unwrap();
        assert_ne!(old_id, new_id);

        drop(old_guard);
        assert_eq!(registry.execution_id(&key("a.com")), Some(new_id));
        drop(new_guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cache_error_propagates_without_registering() {
        let registry = registry();
        let result = registry.claim(
            &key("a.com"),
            || Err(StateError::lock_poisoned("result cache").into()),
            |_guard| unreachable!(),
        );
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_distinct_keys_do_not_interfere() {
        let registry = registry();
        let mut guards = Vec::new();
        for name in ["a.com", "b.com", "c.com"] {
            let claim = registry
                .claim(&key(name), || Ok(None), |guard| {
                    guards.push(guard);
                    futures_util::future::ready(Ok(0)).boxed().shared()
                })
                .unwrap();
            assert!(matches!(claim, Claim::Started(_)));
        }
        assert_eq!(registry.len(), 3);
        guards.clear();
        assert!(registry.is_empty());
    }
}
