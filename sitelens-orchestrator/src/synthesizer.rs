//! Report synthesizer.
//!
//! Aggregates per-target metrics into a single [`Report`]. Apart from the
//! report id and the timestamp read from the injected clock, the output is a
//! pure function of the metrics and the configured thresholds.

use sitelens_core::{
    new_report_id, AnalysisKind, Dimension, DimensionScores, KeywordCount, OrchestratorConfig,
    Priority, Recommendation, Report, ScoreThresholds, SharedClock, SiteLensResult,
    TargetMetrics, TargetSummary, UpstreamError,
};
use std::collections::HashMap;

/// Builds reports from analyzer output.
#[derive(Debug, Clone)]
pub struct ReportSynthesizer {
    thresholds: ScoreThresholds,
    max_keywords: usize,
    max_recommendations: usize,
    clock: SharedClock,
}

impl ReportSynthesizer {
    pub fn new(
        thresholds: ScoreThresholds,
        max_keywords: usize,
        max_recommendations: usize,
        clock: SharedClock,
    ) -> Self {
        Self {
            thresholds,
            max_keywords,
            max_recommendations,
            clock,
        }
    }

    pub fn from_config(config: &OrchestratorConfig, clock: SharedClock) -> Self {
        Self::new(
            config.thresholds,
            config.max_keywords,
            config.max_recommendations,
            clock,
        )
    }

    /// Build a report for `targets` (canonical order) from their metrics.
    ///
    /// Fails with [`UpstreamError::EmptyResult`] when there is nothing to
    /// aggregate.
    pub fn synthesize(
        &self,
        kind: AnalysisKind,
        targets: Vec<String>,
        metrics: &[TargetMetrics],
    ) -> SiteLensResult<Report> {
        if metrics.is_empty() {
            return Err(UpstreamError::EmptyResult.into());
        }

        let mut ordered: Vec<&TargetMetrics> = metrics.iter().collect();
        ordered.sort_by(|a, b| a.target.cmp(&b.target));

        let mut scores = DimensionScores::default();
        for dimension in Dimension::ALL {
            let mean = rounded_mean(ordered.iter().map(|m| m.scores.get(dimension)));
            scores.set(dimension, mean);
        }
        let overall_score = overall(&scores);

        let per_target = ordered
            .iter()
            .map(|m| TargetSummary {
                target: m.target.clone(),
                overall_score: overall(&m.scores),
            })
            .collect();

        let keywords = self.rank_keywords(&ordered);
        let recommendations = self.recommend(&scores, overall_score, &ordered);

        Ok(Report {
            id: new_report_id(),
            kind,
            targets,
            timestamp: self.clock.now(),
            scores,
            overall_score,
            per_target,
            keywords,
            recommendations,
            cached: false,
        })
    }

    fn rank_keywords(&self, metrics: &[&TargetMetrics]) -> Vec<KeywordCount> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for target in metrics {
            for keyword in &target.keywords {
                let keyword = keyword.trim().to_lowercase();
                if !keyword.is_empty() {
                    *counts.entry(keyword).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<KeywordCount> = counts
            .into_iter()
            .map(|(keyword, count)| KeywordCount { keyword, count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
        ranked.truncate(self.max_keywords);
        ranked
    }

    fn recommend(
        &self,
        scores: &DimensionScores,
        overall_score: u8,
        metrics: &[&TargetMetrics],
    ) -> Vec<Recommendation> {
        let ScoreThresholds {
            needs_attention,
            critical,
        } = self.thresholds;
        let mut recommendations = Vec::new();

        if overall_score < needs_attention {
            recommendations.push(Recommendation::new(
                Priority::High,
                "Improve overall site health",
                format!(
                    "Overall score {} is below the target of {}",
                    overall_score, needs_attention
                ),
            ));
        }
        if overall_score < critical {
            recommendations.push(Recommendation::new(
                Priority::Critical,
                "Overall score is critical",
                format!(
                    "Overall score {} is below the critical threshold of {}",
                    overall_score, critical
                ),
            ));
        }

        for (dimension, score) in scores.iter() {
            if score < needs_attention {
                recommendations.push(Recommendation::new(
                    Priority::Medium,
                    format!("Improve {}", dimension.label()),
                    format!(
                        "Average {} score {} is below {}",
                        dimension.label(),
                        score,
                        needs_attention
                    ),
                ));
            }
        }

        // Identical issues from several targets merge into one item.
        let mut issues: Vec<(String, Vec<&str>)> = Vec::new();
        for target in metrics {
            for issue in &target.issues {
                let issue = issue.trim();
                if issue.is_empty() {
                    continue;
                }
                match issues.iter_mut().find(|(existing, _)| existing == issue) {
                    Some((_, targets)) => {
                        if !targets.contains(&target.target.as_str()) {
                            targets.push(target.target.as_str());
                        }
                    }
                    None => issues.push((issue.to_string(), vec![target.target.as_str()])),
                }
            }
        }
        for (issue, targets) in issues {
            recommendations.push(Recommendation::new(
                Priority::Low,
                issue,
                format!("Reported for {}", targets.join(", ")),
            ));
        }

        // Stable: items of equal priority keep insertion order.
        recommendations.sort_by_key(|r| r.priority);
        recommendations.truncate(self.max_recommendations);
        recommendations
    }
}

/// Mean rounded half away from zero, clamped to 0..=100.
fn rounded_mean(values: impl Iterator<Item = u8>) -> u8 {
    let (sum, count) = values.fold((0u32, 0u32), |(sum, count), v| {
        (sum + u32::from(v.min(100)), count + 1)
    });
    if count == 0 {
        return 0;
    }
    let mean = (f64::from(sum) / f64::from(count)).round();
    mean.clamp(0.0, 100.0) as u8
}

fn overall(scores: &DimensionScores) -> u8 {
    rounded_mean(scores.iter().map(|(_, score)| score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitelens_core::{Clock, ManualClock};
    use std::sync::Arc;

    fn synthesizer() -> (ReportSynthesizer, ManualClock) {
        let clock = ManualClock::starting_now();
        let synth =
            ReportSynthesizer::from_config(&OrchestratorConfig::default(), Arc::new(clock.clone()));
        (synth, clock)
    }

    fn metrics(target: &str, p: u8, s: u8, a: u8, b: u8) -> TargetMetrics {
        TargetMetrics::new(target, DimensionScores::new(p, s, a, b))
    }

    fn targets(metrics: &[TargetMetrics]) -> Vec<String> {
        let mut targets: Vec<String> = metrics.iter().map(|m| m.target.clone()).collect();
        targets.sort();
        targets
    }

    #[test]
    fn test_empty_metrics_is_error() {
        let (synth, _) = synthesizer();
        let err = synth.synthesize(AnalysisKind::Quick, vec![], &[]).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_dimension_means_round_half_away_from_zero() {
        let (synth, clock) = synthesizer();
        let input = vec![metrics("a.com", 90, 80, 71, 60), metrics("b.com", 91, 81, 70, 61)];
        let report = synth
            .synthesize(AnalysisKind::Standard, targets(&input), &input)
            .unwrap();

        // 90.5 -> 91, 80.5 -> 81, 70.5 -> 71, 60.5 -> 61
        assert_eq!(report.scores, DimensionScores::new(91, 81, 71, 61));
        // (91 + 81 + 71 + 61) / 4 = 76
        assert_eq!(report.overall_score, 76);
        assert_eq!(report.timestamp, clock.now());
        assert!(!report.cached);
        assert_eq!(report.kind, AnalysisKind::Standard);
    }

    #[test]
    fn test_per_target_summaries_in_canonical_order() {
        let (synth, _) = synthesizer();
        let input = vec![metrics("b.com", 40, 40, 40, 40), metrics("a.com", 100, 90, 80, 70)];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();

        assert_eq!(report.targets, vec!["a.com", "b.com"]);
        assert_eq!(
            report.per_target,
            vec![
                TargetSummary {
                    target: "a.com".to_string(),
                    overall_score: 85
                },
                TargetSummary {
                    target: "b.com".to_string(),
                    overall_score: 40
                },
            ]
        );
    }

    #[test]
    fn test_healthy_report_has_no_score_recommendations() {
        let (synth, _) = synthesizer();
        let input = vec![metrics("a.com", 95, 90, 88, 92)];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_low_scores_produce_prioritized_recommendations() {
        let (synth, _) = synthesizer();
        let input =
            vec![metrics("a.com", 30, 45, 80, 40).with_issues(["Missing meta description"])];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();

        // overall = (30 + 45 + 80 + 40) / 4 = 48.75 -> 49
        assert_eq!(report.overall_score, 49);
        let priorities: Vec<Priority> = report.recommendations.iter().map(|r| r.priority).collect();
        assert_eq!(
            priorities,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Medium,
                Priority::Medium,
                Priority::Medium,
                Priority::Low,
            ]
        );
        let titles: Vec<&str> = report.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles[2], "Improve Performance");
        assert_eq!(titles[3], "Improve SEO");
        assert_eq!(titles[4], "Improve Best practices");
        assert_eq!(titles[5], "Missing meta description");
    }

    #[test]
    fn test_overall_between_thresholds_is_high_not_critical() {
        let (synth, _) = synthesizer();
        let input = vec![metrics("a.com", 60, 60, 60, 60)];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();
        assert!(report.recommendations.iter().any(|r| r.priority == Priority::High));
        assert!(report.recommendations.iter().all(|r| r.priority != Priority::Critical));
    }

    #[test]
    fn test_recommendations_are_truncated() {
        let clock = ManualClock::starting_now();
        let config = OrchestratorConfig {
            max_recommendations: 3,
            ..OrchestratorConfig::default()
        };
        let synth = ReportSynthesizer::from_config(&config, Arc::new(clock));
        let input = vec![metrics("a.com", 10, 10, 10, 10).with_issues(["one", "two"])];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();

        assert_eq!(report.recommendations.len(), 3);
        assert_eq!(report.recommendations[0].priority, Priority::Critical);
        assert_eq!(report.recommendations[1].priority, Priority::High);
        assert_eq!(report.recommendations[2].priority, Priority::Medium);
    }

    #[test]
    fn test_duplicate_issues_merge() {
        let (synth, _) = synthesizer();
        let input = vec![
            metrics("a.com", 90, 90, 90, 90).with_issues(["Images missing alt text"]),
            metrics("b.com", 90, 90, 90, 90).with_issues(["Images missing alt text", "Slow TTFB"]),
        ];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();

        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(report.recommendations[0].title, "Images missing alt text");
        assert_eq!(report.recommendations[0].detail, "Reported for a.com, b.com");
        assert_eq!(report.recommendations[1].title, "Slow TTFB");
    }

    #[test]
    fn test_keywords_ranked_by_frequency_then_alphabetically() {
        let clock = ManualClock::starting_now();
        let config = OrchestratorConfig {
            max_keywords: 3,
            ..OrchestratorConfig::default()
        };
        let synth = ReportSynthesizer::from_config(&config, Arc::new(clock));
        let input = vec![
            metrics("a.com", 80, 80, 80, 80).with_keywords(["pricing", "docs", "blog"]),
            metrics("b.com", 80, 80, 80, 80).with_keywords(["Docs", "api", "blog"]),
            metrics("c.com", 80, 80, 80, 80).with_keywords(["docs", "zebra"]),
        ];
        let report = synth
            .synthesize(AnalysisKind::Quick, targets(&input), &input)
            .unwrap();

        let ranked: Vec<(&str, u32)> = report
            .keywords
            .iter()
            .map(|k| (k.keyword.as_str(), k.count))
            .collect();
        assert_eq!(ranked, vec![("docs", 3), ("blog", 2), ("api", 1)]);
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(std::iter::empty()), 0);
        assert_eq!(rounded_mean([0, 1].into_iter()), 1);
        assert_eq!(rounded_mean([1, 2, 2].into_iter()), 2);
        assert_eq!(rounded_mean([100, 100].into_iter()), 100);
        assert_eq!(rounded_mean([250, 100].into_iter()), 100);
    }
}
