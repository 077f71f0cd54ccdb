//! Error types for SiteLens operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed analysis requests. Raised before any cache, registry or gate work.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request must contain at least one target")]
    EmptyTargets,

    #[error("Target at index {index} is blank")]
    BlankTarget { index: usize },

    #[error("Too many targets: {count} exceeds the limit of {max}")]
    TooManyTargets { count: usize, max: usize },

    #[error("Unknown analysis kind: {kind}")]
    UnknownKind { kind: String },

    #[error("Invalid option {key}: {reason}")]
    InvalidOption { key: String, reason: String },
}

/// A single target that failed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target: String,
    pub reason: String,
}

/// Failures of the injected per-target analyzer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Analyzer failed for {target}: {reason}")]
    AnalyzerFailed { target: String, reason: String },

    #[error("Analyzer timed out for {target} after {timeout_ms}ms")]
    TargetTimeout { target: String, timeout_ms: u64 },

    #[error(
        "{count} target(s) failed analysis, first: {first}",
        count = .failures.len(),
        first = first_failure(.failures)
    )]
    TargetsFailed { failures: Vec<TargetFailure> },

    #[error("Execution aborted: {reason}")]
    ExecutionAborted { reason: String },

    #[error("Analyzer produced no results")]
    EmptyResult,
}

fn first_failure(failures: &[TargetFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{} ({})", f.target, f.reason))
        .unwrap_or_else(|| "none".to_string())
}

/// Admission control rejections from the concurrency gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapacityError {
    #[error("Waiter queue is full: {queued} queued, limit {max_queued}")]
    QueueFull { queued: usize, max_queued: usize },

    #[error("Timed out waiting {waited_ms}ms for an execution slot")]
    AcquireTimeout { waited_ms: u64 },

    #[error("Concurrency gate is closed")]
    GateClosed,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Shared in-memory state errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },
}

impl StateError {
    pub fn lock_poisoned(resource: impl Into<String>) -> Self {
        Self::LockPoisoned {
            resource: resource.into(),
        }
    }
}

/// Master error type for all SiteLens errors.
///
/// `Clone` so one failed execution can be delivered to every attached caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteLensError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl SiteLensError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Capacity(_))
    }
}

/// Result type alias for SiteLens operations.
pub type SiteLensResult<T> = Result<T, SiteLensError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_too_many_targets() {
        let err = ValidationError::TooManyTargets { count: 51, max: 50 };
        let msg = format!("{}", err);
        assert!(msg.contains("51"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn test_upstream_error_display_targets_failed() {
        let err = UpstreamError::TargetsFailed {
            failures: vec![
                TargetFailure {
                    target: "a.com".to_string(),
                    reason: "dns".to_string(),
                },
                TargetFailure {
                    target: "b.com".to_string(),
                    reason: "tls".to_string(),
                },
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 target(s)"));
        assert!(msg.contains("a.com (dns)"));
    }

    #[test]
    fn test_capacity_error_display_queue_full() {
        let err = CapacityError::QueueFull {
            queued: 8,
            max_queued: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("queue is full"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn test_state_error_display_lock_poisoned() {
        let err = StateError::lock_poisoned("result cache");
        assert_eq!(format!("{}", err), "Lock poisoned: result cache");
    }

    #[test]
    fn test_sitelens_error_from_variants() {
        let validation = SiteLensError::from(ValidationError::EmptyTargets);
        assert!(validation.is_validation());

        let upstream = SiteLensError::from(UpstreamError::EmptyResult);
        assert!(upstream.is_upstream());

        let capacity = SiteLensError::from(CapacityError::GateClosed);
        assert!(capacity.is_capacity());

        let config = SiteLensError::from(ConfigError::Parse {
            reason: "bad toml".to_string(),
        });
        assert!(matches!(config, SiteLensError::Config(_)));

        let state = SiteLensError::from(StateError::lock_poisoned("registry"));
        assert!(matches!(state, SiteLensError::State(_)));
    }
}
