//! Deterministic stand-in for a real target analyzer.
//!
//! Scores, keywords and issues are drawn from an RNG seeded by the target and
//! analysis kind, so the same target always produces the same metrics. Only
//! the latency is simulated; nothing leaves the process.

use crate::constants::{
    SIMULATED_ISSUES, SIMULATED_KEYWORDS, SIMULATED_MAX_LATENCY_MS, SIMULATED_MIN_LATENCY_MS,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sitelens_core::{
    compute_content_hash, AnalysisKind, AnalysisOptions, DimensionScores, SiteLensResult,
    TargetAnalyzer, TargetMetrics,
};
use std::time::Duration;

/// Analyzer that fabricates plausible metrics after a short delay.
#[derive(Debug, Clone)]
pub struct SimulatedAnalyzer {
    min_latency: Duration,
    max_latency: Duration,
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(SIMULATED_MIN_LATENCY_MS),
            max_latency: Duration::from_millis(SIMULATED_MAX_LATENCY_MS),
        }
    }
}

impl SimulatedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the latency range. `max` is clamped to at least `min`.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    /// Metrics and latency for a target, without sleeping.
    pub fn simulate(&self, target: &str, kind: AnalysisKind) -> (TargetMetrics, Duration) {
        let mut rng = StdRng::seed_from_u64(seed_for(target, kind));

        // Deeper analyses take longer and surface more detail.
        let depth: u32 = match kind {
            AnalysisKind::Quick => 1,
            AnalysisKind::Standard => 2,
            AnalysisKind::Comprehensive => 3,
        };

        let latency = if self.max_latency > self.min_latency {
            rng.random_range(self.min_latency..self.max_latency)
        } else {
            self.min_latency
        } * depth;

        let scores = DimensionScores::new(
            rng.random_range(35..=100),
            rng.random_range(40..=100),
            rng.random_range(45..=100),
            rng.random_range(50..=100),
        );

        let mut keywords = SIMULATED_KEYWORDS.to_vec();
        keywords.shuffle(&mut rng);
        keywords.truncate(2 + depth as usize);

        let issues: Vec<&str> = SIMULATED_ISSUES
            .iter()
            .copied()
            .filter(|_| rng.random_bool(0.2 * f64::from(depth)))
            .collect();

        let metrics = TargetMetrics::new(target, scores)
            .with_keywords(keywords)
            .with_issues(issues);
        (metrics, latency)
    }
}

#[async_trait]
impl TargetAnalyzer for SimulatedAnalyzer {
    async fn analyze(
        &self,
        target: &str,
        kind: AnalysisKind,
        _options: &AnalysisOptions,
    ) -> SiteLensResult<TargetMetrics> {
        let (metrics, latency) = self.simulate(target, kind);
        tracing::trace!(
            site = %target,
            latency_ms = latency.as_millis() as u64,
            "Simulating analysis"
        );
        tokio::time::sleep(latency).await;
        Ok(metrics)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

fn seed_for(target: &str, kind: AnalysisKind) -> u64 {
    let hash = compute_content_hash(format!("{}|{}", kind.as_str(), target).as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_target_same_metrics() {
        let analyzer = SimulatedAnalyzer::new();
        let (a, latency_a) = analyzer.simulate("example.com", AnalysisKind::Standard);
        let (b, latency_b) = analyzer.simulate("example.com", AnalysisKind::Standard);
        assert_eq!(a, b);
        assert_eq!(latency_a, latency_b);
    }

    #[test]
    fn test_scores_in_range() {
        let analyzer = SimulatedAnalyzer::new();
        for target in ["a.com", "b.org", "c.io", "d.net"] {
            let (metrics, _) = analyzer.simulate(target, AnalysisKind::Quick);
            for (_, score) in metrics.scores.iter() {
                assert!((35..=100).contains(&score));
            }
            assert_eq!(metrics.keywords.len(), 3);
            assert_eq!(metrics.target, target);
        }
    }

    #[test]
    fn test_latency_scales_with_kind() {
        let analyzer = SimulatedAnalyzer::new()
            .with_latency(Duration::from_millis(10), Duration::from_millis(10));
        let (_, quick) = analyzer.simulate("a.com", AnalysisKind::Quick);
        let (_, deep) = analyzer.simulate("a.com", AnalysisKind::Comprehensive);
        assert_eq!(quick, Duration::from_millis(10));
        assert_eq!(deep, Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_analyze_returns_simulated_metrics() {
        let analyzer = SimulatedAnalyzer::new()
            .with_latency(Duration::from_millis(1), Duration::from_millis(2));
        let metrics = analyzer
            .analyze("a.com", AnalysisKind::Quick, &AnalysisOptions::new())
            .await
            .unwrap();
        let (expected, _) = analyzer.simulate("a.com", AnalysisKind::Quick);
        assert_eq!(metrics, expected);
    }
}
