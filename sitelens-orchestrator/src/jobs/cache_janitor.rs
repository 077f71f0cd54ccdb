//! Cache Janitor Background Task
//!
//! Periodically removes result cache entries whose TTL has elapsed. Reads
//! already ignore stale entries, so the janitor only bounds how long expired
//! reports occupy memory when nobody asks for them again.
//!
//! The janitor touches nothing but the cache: in-flight executions and gate
//! slots are never affected by a sweep.

use sitelens_cache::ResultCache;
use sitelens_core::{
    config::DEFAULT_JANITOR_INTERVAL_SECS, OrchestratorConfig, SiteLensResult, UpstreamError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache janitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JanitorConfig {
    /// How often to sweep the cache (default: 5 minutes)
    pub sweep_interval: Duration,

    /// Whether to log sweeps that removed entries at info level (default: true)
    pub log_sweeps: bool,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_JANITOR_INTERVAL_SECS),
            log_sweeps: true,
        }
    }
}

impl JanitorConfig {
    /// Derive janitor settings from the orchestrator configuration.
    pub fn from_orchestrator(config: &OrchestratorConfig) -> Self {
        Self {
            sweep_interval: config.janitor_interval,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for janitor activity.
#[derive(Debug, Default)]
pub struct JanitorMetrics {
    /// Total sweeps completed
    pub sweeps: AtomicU64,

    /// Total expired entries removed
    pub entries_purged: AtomicU64,

    /// Total sweeps that failed
    pub sweep_errors: AtomicU64,
}

impl JanitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> JanitorSnapshot {
        JanitorSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            entries_purged: self.entries_purged.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of janitor metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JanitorSnapshot {
    pub sweeps: u64,
    pub entries_purged: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that purges expired cache entries until shutdown.
///
/// The first sweep runs immediately; later sweeps follow `sweep_interval`.
/// Missed ticks are skipped rather than bunched up.
///
/// # Returns
///
/// Metrics collected during the task's lifetime
pub async fn cache_janitor_task<V>(
    cache: Arc<ResultCache<V>>,
    config: JanitorConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<JanitorMetrics>
where
    V: Clone + Send + 'static,
{
    let metrics = Arc::new(JanitorMetrics::new());

    let mut sweep_interval = interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        ttl_secs = cache.ttl().as_secs(),
        "Cache janitor started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache janitor shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep(&cache, &config, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        entries_purged = snapshot.entries_purged,
        sweep_errors = snapshot.sweep_errors,
        "Cache janitor completed"
    );

    metrics
}

/// Perform one sweep.
fn sweep<V: Clone>(cache: &ResultCache<V>, config: &JanitorConfig, metrics: &JanitorMetrics) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);

    match cache.purge_expired() {
        Ok(0) => tracing::trace!("Cache sweep completed with no expired entries"),
        Ok(purged) => {
            metrics
                .entries_purged
                .fetch_add(purged as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(purged, remaining = cache.len(), "Purged expired cache entries");
            } else {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Cache sweep failed");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Owns a running janitor task.
///
/// Dropping the handle without calling [`JanitorHandle::shutdown`] also stops
/// the janitor, because the shutdown sender is dropped with it.
#[derive(Debug)]
pub struct JanitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Arc<JanitorMetrics>>,
}

impl JanitorHandle {
    /// Spawn the janitor for `cache` on the current runtime.
    pub fn spawn<V>(cache: Arc<ResultCache<V>>, config: JanitorConfig) -> Self
    where
        V: Clone + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(cache_janitor_task(cache, config, shutdown_rx));
        Self { shutdown_tx, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the final metrics.
    pub async fn shutdown(self) -> SiteLensResult<JanitorSnapshot> {
        let _ = self.shutdown_tx.send(true);
        let metrics = self.task.await.map_err(|e| UpstreamError::ExecutionAborted {
            reason: format!("cache janitor task failed: {}", e),
        })?;
        Ok(metrics.snapshot())
    }
}
