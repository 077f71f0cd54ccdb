//! Batch chunker.
//!
//! Drives the per-target analyzer over a canonical target list in fixed-size
//! chunks. Targets within a chunk run concurrently and the chunk always
//! settles fully before the batch either stops or moves on. Pacing applies
//! between chunks, never after the last one.

use futures_util::future::join_all;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use sitelens_core::{
    AnalysisKind, AnalysisOptions, ChunkPacing, OrchestratorConfig, SharedAnalyzer,
    SiteLensError, SiteLensResult, TargetFailure, TargetMetrics, UpstreamError,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the rate limiter we use.
type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

enum Pacer {
    None,
    Pause(Duration),
    RateLimited(Arc<DirectRateLimiter>),
}

impl Pacer {
    fn from_policy(policy: ChunkPacing) -> Self {
        match policy {
            ChunkPacing::None => Self::None,
            ChunkPacing::Pause(pause) if pause.is_zero() => Self::None,
            ChunkPacing::Pause(pause) => Self::Pause(pause),
            ChunkPacing::RateLimited { chunks_per_second } => {
                let quota =
                    Quota::per_second(NonZeroU32::new(chunks_per_second).unwrap_or(NonZeroU32::MIN))
                        .allow_burst(NonZeroU32::MIN);
                Self::RateLimited(Arc::new(RateLimiter::direct(quota)))
            }
        }
    }

    /// Consume the first cell so the first inter-chunk wait is a full period.
    fn prime(&self) {
        if let Self::RateLimited(limiter) = self {
            let _ = limiter.check();
        }
    }

    async fn wait(&self) {
        match self {
            Self::None => {}
            Self::Pause(pause) => tokio::time::sleep(*pause).await,
            Self::RateLimited(limiter) => limiter.until_ready().await,
        }
    }
}

/// Runs the analyzer over a batch of targets.
pub struct BatchChunker {
    analyzer: SharedAnalyzer,
    chunk_size: usize,
    target_timeout: Option<Duration>,
    pacing: ChunkPacing,
}

impl BatchChunker {
    pub fn new(
        analyzer: SharedAnalyzer,
        chunk_size: usize,
        pacing: ChunkPacing,
        target_timeout: Option<Duration>,
    ) -> Self {
        Self {
            analyzer,
            chunk_size: chunk_size.max(1),
            target_timeout,
            pacing,
        }
    }

    pub fn from_config(analyzer: SharedAnalyzer, config: &OrchestratorConfig) -> Self {
        Self::new(
            analyzer,
            config.chunk_size,
            config.chunk_pacing,
            config.target_timeout,
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Analyze every target, returning metrics in input order.
    ///
    /// Stops after the first chunk containing a failure and reports every
    /// failed target of that chunk in [`UpstreamError::TargetsFailed`].
    pub async fn run(
        &self,
        targets: &[String],
        kind: AnalysisKind,
        options: &AnalysisOptions,
    ) -> SiteLensResult<Vec<TargetMetrics>> {
        let total_chunks = targets.len().div_ceil(self.chunk_size);
        let pacer = Pacer::from_policy(self.pacing);
        pacer.prime();

        let mut results = Vec::with_capacity(targets.len());
        for (index, chunk) in targets.chunks(self.chunk_size).enumerate() {
            if index > 0 {
                pacer.wait().await;
            }

            tracing::debug!(
                analyzer = self.analyzer.name(),
                chunk = index + 1,
                total_chunks,
                size = chunk.len(),
                "Analyzing chunk"
            );

            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|target| self.analyze_target(target, kind, options)),
            )
            .await;

            let mut failures = Vec::new();
            for (target, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(metrics) => results.push(metrics),
                    Err(e) => failures.push(TargetFailure {
                        target: target.clone(),
                        reason: failure_reason(&e),
                    }),
                }
            }

            if !failures.is_empty() {
                tracing::warn!(
                    chunk = index + 1,
                    total_chunks,
                    failed = failures.len(),
                    "Chunk failed, stopping batch"
                );
                return Err(UpstreamError::TargetsFailed { failures }.into());
            }
        }

        Ok(results)
    }

    async fn analyze_target(
        &self,
        target: &str,
        kind: AnalysisKind,
        options: &AnalysisOptions,
    ) -> SiteLensResult<TargetMetrics> {
        let analysis = self.analyzer.analyze(target, kind, options);
        let mut metrics = match self.target_timeout {
            Some(timeout) => tokio::time::timeout(timeout, analysis)
                .await
                .map_err(|_| UpstreamError::TargetTimeout {
                    target: target.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })??,
            None => analysis.await?,
        };
        // Reports are keyed by the canonical target, whatever the analyzer echoes.
        metrics.target = target.to_string();
        Ok(metrics)
    }
}

impl std::fmt::Debug for BatchChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchChunker")
            .field("analyzer", &self.analyzer.name())
            .field("chunk_size", &self.chunk_size)
            .field("target_timeout", &self.target_timeout)
            .field("pacing", &self.pacing)
            .finish()
    }
}

fn failure_reason(error: &SiteLensError) -> String {
    match error {
        SiteLensError::Upstream(UpstreamError::AnalyzerFailed { reason, .. }) => reason.clone(),
        SiteLensError::Upstream(UpstreamError::TargetTimeout { timeout_ms, .. }) => {
            format!("timed out after {}ms", timeout_ms)
        }
        other => other.to_string(),
    }
}
