//! Orchestrator facade.
//!
//! [`Orchestrator::run_analysis`] is the single entry point. A request moves
//! through `pending -> queued -> running -> completed | failed`:
//!
//! 1. Validate. Malformed requests never reach the cache, registry or gate.
//! 2. Under the registry lock, return a fresh cached report, attach to an
//!    in-flight execution for the same key, or register a new one.
//! 3. A new execution runs as its own task: acquire a gate slot, run the
//!    chunker, synthesize, cache the report, then release the slot and the
//!    registry entry in that order.
//!
//! Because the execution is a spawned task, it finishes and cleans up even
//! when the caller that started it is cancelled.

use crate::chunker::BatchChunker;
use crate::gate::{ConcurrencyGate, GateStats};
use crate::jobs::{JanitorConfig, JanitorHandle};
use crate::registry::{Claim, InFlightGuard, InFlightRegistry, SharedExecution};
use crate::synthesizer::ReportSynthesizer;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use sitelens_cache::{CacheKey, EntryStats, ResultCache};
use sitelens_core::{
    system_clock, AnalysisKind, AnalysisOptions, AnalysisRequest, OrchestratorConfig, Report,
    SharedAnalyzer, SharedClock, SiteLensError, SiteLensResult, UpstreamError,
};
use std::sync::Arc;
use tokio::task::JoinError;

/// Read-only view of cache, gate and registry state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    /// Entries currently cached
    pub size: usize,
    pub max_size: usize,
    /// Executions holding a gate slot
    pub active_requests: usize,
    pub max_concurrent: usize,
    /// Executions waiting for a gate slot
    pub queued_requests: usize,
    /// Highest `active_requests` observed
    pub peak_active: usize,
    /// Distinct keys with an execution in flight
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Cached entries, most recently used first
    pub entries: Vec<EntryStats>,
}

impl OrchestratorStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    cache: Arc<ResultCache<Arc<Report>>>,
    registry: Arc<InFlightRegistry<Arc<Report>>>,
    gate: ConcurrencyGate,
    chunker: BatchChunker,
    synthesizer: ReportSynthesizer,
}

/// Deduplicating, cached, concurrency-bounded analysis runner.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build an orchestrator around an injected analyzer and clock.
    pub fn new(
        config: OrchestratorConfig,
        analyzer: SharedAnalyzer,
        clock: SharedClock,
    ) -> SiteLensResult<Self> {
        config.validate()?;

        let cache = Arc::new(ResultCache::new(
            config.cache_max_size,
            config.cache_ttl,
            Arc::clone(&clock),
        )?);
        let registry = Arc::new(InFlightRegistry::new(Arc::clone(&clock)));
        let gate = ConcurrencyGate::from_config(&config);
        let chunker = BatchChunker::from_config(analyzer, &config);
        let synthesizer = ReportSynthesizer::from_config(&config, clock);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                cache,
                registry,
                gate,
                chunker,
                synthesizer,
            }),
        })
    }

    /// Default configuration and the system clock.
    pub fn with_defaults(analyzer: SharedAnalyzer) -> SiteLensResult<Self> {
        Self::new(OrchestratorConfig::default(), analyzer, system_clock())
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Analyze a request, sharing work with identical requests.
    ///
    /// The returned report has `cached = true` only when it was served from
    /// the result cache; callers attached to an in-flight execution receive
    /// the same report with `cached = false`.
    ///
    /// New executions are spawned on the current tokio runtime. Outside a
    /// runtime they fail with [`UpstreamError::ExecutionAborted`] and leave
    /// nothing registered.
    pub async fn run_analysis(&self, request: AnalysisRequest) -> SiteLensResult<Report> {
        if let Err(e) = request.validate(self.inner.config.max_targets) {
            tracing::warn!(
                requester = %request.requester_id,
                error = %e,
                "Rejected invalid analysis request"
            );
            return Err(e.into());
        }

        let key = CacheKey::for_request(&request);
        let targets = request.canonical_targets();
        tracing::debug!(
            key_prefix = %key.prefix(),
            requester = %request.requester_id,
            kind = %request.kind,
            targets = targets.len(),
            state = "pending",
            "Analysis requested"
        );

        let AnalysisRequest { kind, options, .. } = request;
        let inner = Arc::clone(&self.inner);
        let claim = self.inner.registry.claim(
            &key,
            || self.inner.cache.get(&key),
            move |guard| Inner::start_execution(inner, guard, kind, targets, options),
        )?;

        match claim {
            Claim::Cached(report) => {
                tracing::debug!(key_prefix = %key.prefix(), "Cache hit");
                Ok(report.with_cached(true))
            }
            Claim::Attached(execution) => execution.await.map(|report| report.with_cached(false)),
            Claim::Started(execution) => execution.await.map(|report| report.with_cached(false)),
        }
    }

    /// Snapshot of cache, gate and registry state. No side effects.
    pub fn cache_stats(&self) -> SiteLensResult<OrchestratorStats> {
        let cache = self.inner.cache.stats()?;
        let GateStats {
            active,
            queued,
            peak_active,
            max_concurrent,
            ..
        } = self.inner.gate.stats();

        Ok(OrchestratorStats {
            size: cache.size,
            max_size: cache.max_size,
            active_requests: active,
            max_concurrent,
            queued_requests: queued,
            peak_active,
            in_flight: self.inner.registry.len(),
            hits: cache.hits,
            misses: cache.misses,
            evictions: cache.evictions,
            expirations: cache.expirations,
            entries: cache.entries,
        })
    }

    /// Drop every cached report. In-flight executions are unaffected and
    /// will still cache their results when they finish.
    pub fn clear_cache(&self) -> SiteLensResult<usize> {
        let cleared = self.inner.cache.clear()?;
        tracing::info!(cleared, "Result cache cleared");
        Ok(cleared)
    }

    /// Stop admitting new executions.
    ///
    /// Executions already holding a slot run to completion and cache their
    /// reports. Queued and future executions fail with
    /// [`CapacityError::GateClosed`](sitelens_core::CapacityError::GateClosed).
    /// Fresh cached reports are still served.
    pub fn close(&self) {
        self.inner.gate.close();
        tracing::info!(
            active = self.inner.gate.active(),
            queued = self.inner.gate.queued(),
            "Orchestrator closed to new executions"
        );
    }

    /// Start the background janitor for this orchestrator's cache.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_janitor(&self) -> JanitorHandle {
        JanitorHandle::spawn(
            Arc::clone(&self.inner.cache),
            JanitorConfig::from_orchestrator(&self.inner.config),
        )
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .field("gate", &self.inner.gate)
            .field("chunker", &self.inner.chunker)
            .finish()
    }
}

impl Inner {
    /// Spawn the execution task and wrap its join handle in a shared future.
    fn start_execution(
        inner: Arc<Inner>,
        guard: InFlightGuard<Arc<Report>>,
        kind: AnalysisKind,
        targets: Vec<String>,
        options: AnalysisOptions,
    ) -> SharedExecution<Arc<Report>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let reason = format!("no tokio runtime to run the analysis: {}", e);
                tracing::error!(reason = %reason, "Execution aborted");
                // The guard is released when the handle is first polled, after
                // the registry lock held by `claim` is gone.
                return async move {
                    drop(guard);
                    Err::<Arc<Report>, _>(SiteLensError::from(UpstreamError::ExecutionAborted {
                        reason,
                    }))
                }
                .boxed()
                .shared();
            }
        };
        let task = runtime.spawn(async move { inner.execute(guard, kind, targets, options).await });
        async move { task.await.unwrap_or_else(|e| Err(aborted(e).into())) }
            .boxed()
            .shared()
    }

    async fn execute(
        &self,
        guard: InFlightGuard<Arc<Report>>,
        kind: AnalysisKind,
        targets: Vec<String>,
        options: AnalysisOptions,
    ) -> SiteLensResult<Arc<Report>> {
        let key_prefix = guard.key().prefix().to_string();
        let execution_id = guard.execution_id();
        tracing::debug!(
            key_prefix = %key_prefix,
            execution_id = %execution_id,
            state = "queued",
            "Waiting for execution slot"
        );

        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!(
                    key_prefix = %key_prefix,
                    execution_id = %execution_id,
                    error = %e,
                    state = "failed",
                    "Execution rejected by concurrency gate"
                );
                return Err(e.into());
            }
        };
        tracing::debug!(
            key_prefix = %key_prefix,
            execution_id = %execution_id,
            active = self.gate.active(),
            state = "running",
            "Execution started"
        );

        let outcome = match self.chunker.run(&targets, kind, &options).await {
            Ok(metrics) => self.synthesizer.synthesize(kind, targets, &metrics),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                let report = Arc::new(report);
                // Cache before releasing the registry entry so a new caller
                // always finds either the entry or the cached report.
                match self.cache.put(guard.key().clone(), Arc::clone(&report)) {
                    Ok(Some(evicted)) => tracing::debug!(
                        evicted_prefix = %evicted.prefix(),
                        "Cache full, evicted least recently used report"
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        key_prefix = %key_prefix,
                        error = %e,
                        "Failed to cache report"
                    ),
                }
                drop(permit);
                drop(guard);
                tracing::debug!(
                    key_prefix = %key_prefix,
                    execution_id = %execution_id,
                    report_id = %report.id,
                    overall_score = report.overall_score,
                    state = "completed",
                    "Execution completed"
                );
                Ok(report)
            }
            Err(e) => {
                drop(permit);
                drop(guard);
                tracing::warn!(
                    key_prefix = %key_prefix,
                    execution_id = %execution_id,
                    error = %e,
                    state = "failed",
                    "Execution failed"
                );
                Err(e)
            }
        }
    }
}

fn aborted(error: JoinError) -> UpstreamError {
    let reason = if error.is_panic() {
        "analysis task panicked".to_string()
    } else {
        format!("analysis task cancelled: {}", error)
    };
    tracing::error!(reason = %reason, "Execution aborted");
    UpstreamError::ExecutionAborted { reason }
}
