//! SiteLens Orchestrator - Cached, Deduplicated Analysis Runs
//!
//! Accepts "analyze these targets" requests, serves repeated requests from a
//! bounded TTL cache, collapses concurrent identical requests into a single
//! execution, and bounds how many executions run at once.
//!
//! The per-target analysis itself is injected through
//! [`sitelens_core::TargetAnalyzer`]; this crate only decides when and how
//! often it runs.

pub mod chunker;
pub mod constants;
pub mod gate;
pub mod jobs;
pub mod orchestrator;
pub mod registry;
pub mod simulated;
pub mod synthesizer;
pub mod telemetry;

// Re-export commonly used types
pub use chunker::BatchChunker;
pub use gate::{ConcurrencyGate, GatePermit, GateStats};
pub use jobs::{JanitorConfig, JanitorHandle, JanitorSnapshot};
pub use orchestrator::{Orchestrator, OrchestratorStats};
pub use registry::{Claim, InFlightGuard, InFlightRegistry, SharedExecution};
pub use simulated::SimulatedAnalyzer;
pub use synthesizer::ReportSynthesizer;
pub use telemetry::{init_tracing, TelemetryConfig};
