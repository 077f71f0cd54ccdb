//! SiteLens Test Utilities
//!
//! Centralized test infrastructure for the SiteLens workspace:
//! - A scriptable fake analyzer with call and concurrency tracking
//! - Proptest generators for requests and metrics
//! - Test fixtures for common scenarios
//! - Custom assertions for SiteLens error categories

// Re-export core types for convenience
pub use sitelens_core::{
    AnalysisKind, AnalysisOptions, AnalysisRequest, ChunkPacing, DimensionScores,
    OrchestratorConfig, Report, SiteLensError, SiteLensResult, TargetAnalyzer, TargetMetrics,
    UpstreamError,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// FAKE ANALYZER
// ============================================================================

/// Scores returned for targets without a scripted override.
pub const DEFAULT_FAKE_SCORES: DimensionScores = DimensionScores {
    performance: 82,
    seo: 76,
    accessibility: 91,
    best_practices: 88,
};

#[derive(Debug, Default)]
struct Script {
    metrics: HashMap<String, TargetMetrics>,
    failures: HashMap<String, String>,
    panics: Vec<String>,
    calls: HashMap<String, usize>,
    call_order: Vec<String>,
}

/// Scriptable analyzer for tests.
///
/// Records every call, the order calls started in, and the peak number of
/// calls running at once. Failures and panics can be scripted per target and
/// changed while the analyzer is shared.
#[derive(Debug, Default)]
pub struct FakeAnalyzer {
    latency: Duration,
    reported_target: Option<String>,
    script: Mutex<Script>,
    total_calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Return these metrics (re-targeted) for `metrics.target`.
    pub fn with_metrics(self, metrics: TargetMetrics) -> Self {
        self.script().metrics.insert(metrics.target.clone(), metrics);
        self
    }

    /// Report this target name in every result instead of the requested one.
    pub fn with_reported_target(mut self, target: impl Into<String>) -> Self {
        self.reported_target = Some(target.into());
        self
    }

    /// Make calls for `target` fail with `AnalyzerFailed`.
    pub fn fail_target(&self, target: impl Into<String>, reason: impl Into<String>) {
        self.script().failures.insert(target.into(), reason.into());
    }

    /// Let calls for `target` succeed again.
    pub fn clear_failure(&self, target: &str) {
        self.script().failures.remove(target);
    }

    /// Make calls for `target` panic.
    pub fn panic_on(&self, target: impl Into<String>) {
        self.script().panics.push(target.into());
    }

    /// Total calls across all targets.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Calls for one target.
    pub fn calls_for(&self, target: &str) -> usize {
        self.script().calls.get(target).copied().unwrap_or(0)
    }

    /// Targets in the order their calls started.
    pub fn call_order(&self) -> Vec<String> {
        self.script().call_order.clone()
    }

    /// Calls running right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Decrements the active count even if the call panics or is cancelled.
struct ActiveCall<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TargetAnalyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        target: &str,
        _kind: AnalysisKind,
        _options: &AnalysisOptions,
    ) -> SiteLensResult<TargetMetrics> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let (failure, panics, scripted) = {
            let mut script = self.script();
            *script.calls.entry(target.to_string()).or_insert(0) += 1;
            script.call_order.push(target.to_string());
            (
                script.failures.get(target).cloned(),
                script.panics.iter().any(|t| t == target),
                script.metrics.get(target).cloned(),
            )
        };

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveCall {
            active: &self.active,
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if panics {
            panic!("scripted analyzer panic for {}", target);
        }

        if let Some(reason) = failure {
            return Err(UpstreamError::AnalyzerFailed {
                target: target.to_string(),
                reason,
            }
            .into());
        }

        let mut metrics =
            scripted.unwrap_or_else(|| TargetMetrics::new(target, DEFAULT_FAKE_SCORES));
        metrics.target = self
            .reported_target
            .clone()
            .unwrap_or_else(|| target.to_string());
        Ok(metrics)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating SiteLens inputs.

    use super::*;
    use proptest::prelude::*;
    use std::ops::Range;

    /// Generate a plausible target host name.
    pub fn arb_target() -> impl Strategy<Value = String> {
        "[a-z]{1,10}\\.(com|org|io|dev)"
    }

    /// Generate a non-empty list of targets (duplicates allowed).
    pub fn arb_targets(size: Range<usize>) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_target(), size)
    }

    /// Generate an AnalysisKind.
    pub fn arb_kind() -> impl Strategy<Value = AnalysisKind> {
        prop_oneof![
            Just(AnalysisKind::Quick),
            Just(AnalysisKind::Standard),
            Just(AnalysisKind::Comprehensive),
        ]
    }

    /// Generate scores, each in 0..=100.
    pub fn arb_scores() -> impl Strategy<Value = DimensionScores> {
        (0u8..=100, 0u8..=100, 0u8..=100, 0u8..=100)
            .prop_map(|(p, s, a, b)| DimensionScores::new(p, s, a, b))
    }

    /// Generate a small option map.
    pub fn arb_options() -> impl Strategy<Value = AnalysisOptions> {
        prop::collection::btree_map(
            "[a-z]{1,8}",
            prop_oneof![
                any::<bool>().prop_map(serde_json::Value::from),
                (0i64..1000).prop_map(serde_json::Value::from),
                "[a-z]{0,8}".prop_map(serde_json::Value::from),
            ],
            0..4,
        )
    }

    /// Generate a valid request.
    pub fn arb_request() -> impl Strategy<Value = AnalysisRequest> {
        (arb_targets(1..8), arb_kind(), "[a-z]{3,8}", arb_options()).prop_map(
            |(targets, kind, requester, options)| {
                AnalysisRequest::new(targets, kind, requester).with_options(options)
            },
        )
    }

    /// Generate metrics for one target.
    pub fn arb_target_metrics(target: String) -> impl Strategy<Value = TargetMetrics> {
        (
            arb_scores(),
            prop::collection::vec("[a-z]{2,6}", 0..5),
            prop::collection::vec("[A-Z][a-z ]{4,20}", 0..3),
        )
            .prop_map(move |(scores, keywords, issues)| {
                TargetMetrics::new(target.clone(), scores)
                    .with_keywords(keywords)
                    .with_issues(issues)
            })
    }

    /// Generate metrics for a batch of distinct targets.
    pub fn arb_target_metrics_batch(
        size: Range<usize>,
    ) -> impl Strategy<Value = Vec<TargetMetrics>> {
        prop::collection::btree_set(arb_target(), size).prop_flat_map(|targets| {
            targets
                .into_iter()
                .map(arb_target_metrics)
                .collect::<Vec<_>>()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common scenarios.

    use super::*;

    /// A quick-kind request from a fixed requester.
    pub fn request(targets: &[&str]) -> AnalysisRequest {
        AnalysisRequest::new(targets.iter().copied(), AnalysisKind::Quick, "test-user")
    }

    /// Metrics with explicit scores.
    pub fn metrics(
        target: &str,
        performance: u8,
        seo: u8,
        accessibility: u8,
        best_practices: u8,
    ) -> TargetMetrics {
        TargetMetrics::new(
            target,
            DimensionScores::new(performance, seo, accessibility, best_practices),
        )
    }

    /// Configuration without inter-chunk pacing or timeouts, for fast tests.
    pub fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_chunk_pacing(ChunkPacing::None)
            .with_target_timeout(None)
    }

    /// `n` distinct target names.
    pub fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("site-{i:03}.com")).collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for SiteLens-specific validation.

    use super::*;

    /// Assert that a SiteLensResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &SiteLensResult<T>) {
        match result {
            Err(SiteLensError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a SiteLensResult is an Upstream error.
    #[track_caller]
    pub fn assert_upstream_error<T: std::fmt::Debug>(result: &SiteLensResult<T>) {
        match result {
            Err(SiteLensError::Upstream(_)) => {}
            other => panic!("Expected Upstream error, got: {:?}", other),
        }
    }

    /// Assert that a SiteLensResult is a Capacity error.
    #[track_caller]
    pub fn assert_capacity_error<T: std::fmt::Debug>(result: &SiteLensResult<T>) {
        match result {
            Err(SiteLensError::Capacity(_)) => {}
            other => panic!("Expected Capacity error, got: {:?}", other),
        }
    }

    /// Assert that every score in a report lies within 0..=100.
    #[track_caller]
    pub fn assert_scores_in_range(report: &Report) {
        assert!(
            report.overall_score <= 100,
            "Overall score {} out of range",
            report.overall_score
        );
        for (dimension, score) in report.scores.iter() {
            assert!(score <= 100, "{} score {} out of range", dimension, score);
        }
        for summary in &report.per_target {
            assert!(
                summary.overall_score <= 100,
                "Score {} for {} out of range",
                summary.overall_score,
                summary.target
            );
        }
    }

    /// Assert that two reports carry the same result, ignoring the cached flag.
    #[track_caller]
    pub fn assert_same_result(a: &Report, b: &Report) {
        assert!(
            a.same_result(b),
            "Reports differ:\n{:?}\n{:?}",
            a,
            b
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fake_analyzer_counts_calls() {
        let analyzer = FakeAnalyzer::new();
        let options = AnalysisOptions::new();
        analyzer.analyze("a.com", AnalysisKind::Quick, &options).await.unwrap();
        analyzer.analyze("a.com", AnalysisKind::Quick, &options).await.unwrap();
        analyzer.analyze("b.com", AnalysisKind::Quick, &options).await.unwrap();

        assert_eq!(analyzer.total_calls(), 3);
        assert_eq!(analyzer.calls_for("a.com"), 2);
        assert_eq!(analyzer.calls_for("c.com"), 0);
        assert_eq!(analyzer.call_order(), vec!["a.com", "a.com", "b.com"]);
        assert_eq!(analyzer.active(), 0);
    }

    #[tokio::test]
    async fn test_fake_analyzer_scripted_failure() {
        let analyzer = FakeAnalyzer::new();
        let options = AnalysisOptions::new();
        analyzer.fail_target("a.com", "boom");

        let result = analyzer.analyze("a.com", AnalysisKind::Quick, &options).await;
        assertions::assert_upstream_error(&result);

        analyzer.clear_failure("a.com");
        assert!(analyzer.analyze("a.com", AnalysisKind::Quick, &options).await.is_ok());
    }

    #[tokio::test]
    async fn test_fake_analyzer_scripted_metrics() {
        let analyzer = FakeAnalyzer::new().with_metrics(fixtures::metrics("a.com", 10, 20, 30, 40));
        let metrics = analyzer
            .analyze("a.com", AnalysisKind::Quick, &AnalysisOptions::new())
            .await
            .unwrap();
        assert_eq!(metrics.scores, DimensionScores::new(10, 20, 30, 40));

        let default = analyzer
            .analyze("b.com", AnalysisKind::Quick, &AnalysisOptions::new())
            .await
            .unwrap();
        assert_eq!(default.scores, DEFAULT_FAKE_SCORES);
    }

    #[tokio::test]
    async fn test_fake_analyzer_tracks_peak_concurrency() {
        let analyzer = Arc::new(FakeAnalyzer::new().with_latency(Duration::from_millis(20)));
        let options = AnalysisOptions::new();
        let (a, b, c) = tokio::join!(
            analyzer.analyze("a.com", AnalysisKind::Quick, &options),
            analyzer.analyze("b.com", AnalysisKind::Quick, &options),
            analyzer.analyze("c.com", AnalysisKind::Quick, &options),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(analyzer.peak_concurrency(), 3);
        assert_eq!(analyzer.active(), 0);
    }

    #[test]
    fn test_fast_config_is_valid() {
        assert!(fixtures::fast_config().validate().is_ok());
    }

    #[test]
    fn test_request_fixture() {
        let request = fixtures::request(&["b.com", "a.com"]);
        assert_eq!(request.kind, AnalysisKind::Quick);
        assert_eq!(request.canonical_targets(), vec!["a.com", "b.com"]);
    }

    proptest! {
        #[test]
        fn prop_generated_requests_are_valid(request in generators::arb_request()) {
            prop_assert!(request.validate(50).is_ok());
        }

        #[test]
        fn prop_batch_targets_are_distinct(batch in generators::arb_target_metrics_batch(1..6)) {
            let mut targets: Vec<&str> = batch.iter().map(|m| m.target.as_str()).collect();
            let before = targets.len();
            targets.dedup();
            prop_assert_eq!(before, targets.len());
        }
    }
}
