//! Per-target analyzer capability.
//!
//! The orchestrator never hard-wires how a target is analyzed. Production
//! code injects an implementation that calls external services; tests inject
//! deterministic fakes.

use crate::{AnalysisKind, AnalysisOptions, SiteLensResult, TargetMetrics};
use async_trait::async_trait;
use std::sync::Arc;

/// Analyzes a single target.
#[async_trait]
pub trait TargetAnalyzer: Send + Sync {
    /// Analyze one target.
    ///
    /// # Arguments
    /// * `target` - Canonical (trimmed) target identifier
    /// * `kind` - Depth of analysis requested
    /// * `options` - Request options, already part of the cache identity
    ///
    /// # Returns
    /// * `Ok(TargetMetrics)` - Scores, keywords and issues for the target
    /// * `Err(SiteLensError::Upstream)` - If the analysis fails
    async fn analyze(
        &self,
        target: &str,
        kind: AnalysisKind,
        options: &AnalysisOptions,
    ) -> SiteLensResult<TargetMetrics>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "analyzer"
    }
}

/// Shared handle to an analyzer implementation.
pub type SharedAnalyzer = Arc<dyn TargetAnalyzer>;

#[async_trait]
impl<T: TargetAnalyzer + ?Sized> TargetAnalyzer for Arc<T> {
    async fn analyze(
        &self,
        target: &str,
        kind: AnalysisKind,
        options: &AnalysisOptions,
    ) -> SiteLensResult<TargetMetrics> {
        (**self).analyze(target, kind, options).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
