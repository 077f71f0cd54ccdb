//! SiteLens Core - Request, Report and Error Types
//!
//! Pure data structures shared by every SiteLens crate. The only behavior
//! here is validation, canonicalization and configuration loading; caching
//! and orchestration live in `sitelens-cache` and `sitelens-orchestrator`.

pub mod analyzer;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod report;
pub mod request;

pub use analyzer::{SharedAnalyzer, TargetAnalyzer};
pub use clock::{elapsed_between, system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ChunkPacing, OrchestratorConfig, ScoreThresholds};
pub use error::{
    CapacityError, ConfigError, SiteLensError, SiteLensResult, StateError, TargetFailure,
    UpstreamError, ValidationError,
};
pub use identity::{
    compute_content_hash, content_hash_hex, new_execution_id, new_report_id, ContentHash,
    ExecutionId, ReportId, Timestamp,
};
pub use report::{
    Dimension, DimensionScores, KeywordCount, Priority, Recommendation, Report, TargetMetrics,
    TargetSummary,
};
pub use request::{AnalysisKind, AnalysisOptions, AnalysisRequest};
