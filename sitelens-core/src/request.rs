//! Analysis request types.
//!
//! A request names a set of targets, the kind of analysis to run and the
//! options that shape the output. Target order never matters: every consumer
//! works on [`AnalysisRequest::canonical_targets`].

use crate::{SiteLensResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ANALYSIS KIND
// ============================================================================

/// Depth of analysis requested for every target.
///
/// Deserialization goes through [`AnalysisKind::parse`], so every entry path
/// accepts the same spellings and rejects with the same `UnknownKind` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AnalysisKind {
    /// Shallow pass, a handful of checks per target
    Quick,
    /// Default depth
    Standard,
    /// Every check, including slow crawls
    Comprehensive,
}

impl AnalysisKind {
    /// Stable string form, also used when deriving cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Parse a user-supplied kind, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            _ => Err(ValidationError::UnknownKind {
                kind: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AnalysisKind {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Options that affect analysis output.
///
/// Backed by a `BTreeMap` so iteration (and therefore serialization) is
/// always in key order.
pub type AnalysisOptions = BTreeMap<String, serde_json::Value>;

// ============================================================================
// REQUEST
// ============================================================================

/// A request to analyze a set of targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub targets: Vec<String>,
    pub kind: AnalysisKind,
    pub requester_id: String,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    /// Create a request with no options.
    pub fn new<I, S>(targets: I, kind: AnalysisKind, requester_id: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            kind,
            requester_id: requester_id.into(),
            options: AnalysisOptions::new(),
        }
    }

    /// Build a request from untyped input, rejecting unknown kinds.
    pub fn parse<I, S>(
        targets: I,
        kind: &str,
        requester_id: impl Into<String>,
    ) -> SiteLensResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = AnalysisKind::parse(kind)?;
        Ok(Self::new(targets, kind, requester_id))
    }

    /// Set a single option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Replace all options.
    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the request shape.
    ///
    /// Validates:
    /// - at least one target
    /// - no blank targets
    /// - at most `max_targets` distinct targets
    /// - no blank option keys
    pub fn validate(&self, max_targets: usize) -> Result<(), ValidationError> {
        if self.targets.is_empty() {
            return Err(ValidationError::EmptyTargets);
        }

        if let Some(index) = self.targets.iter().position(|t| t.trim().is_empty()) {
            return Err(ValidationError::BlankTarget { index });
        }

        let count = self.canonical_targets().len();
        if count > max_targets {
            return Err(ValidationError::TooManyTargets {
                count,
                max: max_targets,
            });
        }

        if self.options.keys().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::InvalidOption {
                key: String::new(),
                reason: "option keys must not be blank".to_string(),
            });
        }

        Ok(())
    }

    /// Trimmed, sorted, de-duplicated targets.
    pub fn canonical_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .targets
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }
}
