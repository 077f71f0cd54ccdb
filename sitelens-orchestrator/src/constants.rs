//! Constants for the SiteLens orchestrator
//!
//! Request, cache and gate defaults live with `OrchestratorConfig` in
//! `sitelens-core`. This module holds the values that only matter to the
//! runtime pieces of this crate.

// ============================================================================
// TELEMETRY
// ============================================================================

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "sitelens=debug,sitelens_orchestrator=debug,info";

/// Service name attached to the telemetry startup event.
pub const DEFAULT_SERVICE_NAME: &str = "sitelens";

// ============================================================================
// REGISTRY / STATS
// ============================================================================

/// Name used in lock-poisoning errors for the in-flight registry.
pub const REGISTRY_RESOURCE: &str = "in-flight registry";

// ============================================================================
// SIMULATED ANALYZER
// ============================================================================

/// Lower bound of simulated per-target latency in milliseconds.
pub const SIMULATED_MIN_LATENCY_MS: u64 = 150;

/// Upper bound (exclusive) of simulated per-target latency in milliseconds.
pub const SIMULATED_MAX_LATENCY_MS: u64 = 600;

/// Keywords the simulated analyzer draws from.
pub const SIMULATED_KEYWORDS: &[&str] = &[
    "analytics",
    "checkout",
    "docs",
    "pricing",
    "privacy",
    "blog",
    "search",
    "support",
    "careers",
    "api",
];

/// Issues the simulated analyzer may report.
pub const SIMULATED_ISSUES: &[&str] = &[
    "Images missing alt text",
    "Render-blocking scripts in head",
    "Missing meta description",
    "Large layout shift on load",
    "Mixed content over HTTPS",
];
