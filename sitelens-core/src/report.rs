//! Per-target metrics and synthesized report types.

use crate::{AnalysisKind, ReportId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// DIMENSIONS
// ============================================================================

/// A scored dimension of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Performance,
    Seo,
    Accessibility,
    BestPractices,
}

impl Dimension {
    /// All dimensions in report order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Performance,
        Dimension::Seo,
        Dimension::Accessibility,
        Dimension::BestPractices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Seo => "seo",
            Self::Accessibility => "accessibility",
            Self::BestPractices => "best_practices",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Performance => "Performance",
            Self::Seo => "SEO",
            Self::Accessibility => "Accessibility",
            Self::BestPractices => "Best practices",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores for every dimension, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub performance: u8,
    pub seo: u8,
    pub accessibility: u8,
    pub best_practices: u8,
}

impl DimensionScores {
    pub fn new(performance: u8, seo: u8, accessibility: u8, best_practices: u8) -> Self {
        Self {
            performance,
            seo,
            accessibility,
            best_practices,
        }
    }

    /// Score for one dimension.
    pub fn get(&self, dimension: Dimension) -> u8 {
        match dimension {
            Dimension::Performance => self.performance,
            Dimension::Seo => self.seo,
            Dimension::Accessibility => self.accessibility,
            Dimension::BestPractices => self.best_practices,
        }
    }

    /// Set the score for one dimension, clamped to 100.
    pub fn set(&mut self, dimension: Dimension, score: u8) {
        let score = score.min(100);
        match dimension {
            Dimension::Performance => self.performance = score,
            Dimension::Seo => self.seo = score,
            Dimension::Accessibility => self.accessibility = score,
            Dimension::BestPractices => self.best_practices = score,
        }
    }

    /// Iterate `(dimension, score)` pairs in report order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, u8)> + '_ {
        Dimension::ALL.iter().map(move |d| (*d, self.get(*d)))
    }
}

// ============================================================================
// PER-TARGET METRICS
// ============================================================================

/// Output of the per-target analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub scores: DimensionScores,
    /// Keywords discovered on the target, most relevant first.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Free-form issues reported by the analyzer.
    #[serde(default)]
    pub issues: Vec<String>,
}

impl TargetMetrics {
    pub fn new(target: impl Into<String>, scores: DimensionScores) -> Self {
        Self {
            target: target.into(),
            scores,
            keywords: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_issues<I, S>(mut self, issues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issues = issues.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Recommendation priority. Ordering is most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// A prioritized recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub detail: String,
}

impl Recommendation {
    pub fn new(priority: Priority, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// A keyword with the number of targets it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: u32,
}

/// Overall score of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target: String,
    pub overall_score: u8,
}

/// Aggregated analysis report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub kind: AnalysisKind,
    /// Targets in canonical (sorted) order.
    pub targets: Vec<String>,
    pub timestamp: Timestamp,
    pub scores: DimensionScores,
    pub overall_score: u8,
    pub per_target: Vec<TargetSummary>,
    pub keywords: Vec<KeywordCount>,
    pub recommendations: Vec<Recommendation>,
    /// True when served from the result cache.
    pub cached: bool,
}

impl Report {
    /// Copy of this report with the cached flag set.
    pub fn with_cached(&self, cached: bool) -> Self {
        Self {
            cached,
            ..self.clone()
        }
    }

    /// Equality ignoring the cached flag.
    pub fn same_result(&self, other: &Report) -> bool {
        self.with_cached(false) == other.with_cached(false)
    }
}
