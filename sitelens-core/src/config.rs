//! Configuration types

use crate::{ConfigError, SiteLensError, SiteLensResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default number of executions allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default bound on callers waiting for an execution slot.
pub const DEFAULT_MAX_QUEUED: usize = 64;

/// Default result cache TTL (30 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;

/// Default result cache capacity.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 100;

/// Default number of targets analyzed concurrently within one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 3;

/// Default chunk admission rate.
pub const DEFAULT_CHUNKS_PER_SECOND: u32 = 10;

/// Default per-target analyzer timeout.
pub const DEFAULT_TARGET_TIMEOUT_SECS: u64 = 30;

/// Default janitor sweep interval (5 minutes).
pub const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 5 * 60;

/// Default maximum distinct targets per request.
pub const DEFAULT_MAX_TARGETS: usize = 50;

/// Default keyword list length in reports.
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

/// Default recommendation list length in reports.
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 8;

/// Longest inter-chunk pause accepted by validation.
pub const MAX_CHUNK_PAUSE: Duration = Duration::from_secs(10);

// ============================================================================
// SCORE THRESHOLDS
// ============================================================================

/// Score thresholds used to derive recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    /// Scores below this need attention.
    pub needs_attention: u8,
    /// Scores below this are critical. Must be below `needs_attention`.
    pub critical: u8,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            needs_attention: 70,
            critical: 50,
        }
    }
}

// ============================================================================
// CHUNK PACING
// ============================================================================

/// Backpressure applied between consecutive chunks of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPacing {
    /// Start the next chunk as soon as the previous one settles
    None,
    /// Fixed bounded pause between chunks
    Pause(Duration),
    /// Token bucket admitting at most this many chunks per second
    RateLimited { chunks_per_second: u32 },
}

impl Default for ChunkPacing {
    fn default() -> Self {
        Self::RateLimited {
            chunks_per_second: DEFAULT_CHUNKS_PER_SECOND,
        }
    }
}

// ============================================================================
// ORCHESTRATOR CONFIG
// ============================================================================

/// Configuration for the analysis orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    // Concurrency gate
    pub max_concurrent: usize,
    /// `None` leaves the waiter queue unbounded.
    pub max_queued: Option<usize>,
    /// `None` waits for a slot indefinitely.
    pub acquire_timeout: Option<Duration>,

    // Result cache
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    pub janitor_interval: Duration,

    // Batch chunker
    pub chunk_size: usize,
    pub chunk_pacing: ChunkPacing,
    /// `None` lets analyzer calls run unbounded.
    pub target_timeout: Option<Duration>,

    // Requests and reports
    pub max_targets: usize,
    pub max_keywords: usize,
    pub max_recommendations: usize,
    pub thresholds: ScoreThresholds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_queued: Some(DEFAULT_MAX_QUEUED),
            acquire_timeout: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            janitor_interval: Duration::from_secs(DEFAULT_JANITOR_INTERVAL_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_pacing: ChunkPacing::default(),
            target_timeout: Some(Duration::from_secs(DEFAULT_TARGET_TIMEOUT_SECS)),
            max_targets: DEFAULT_MAX_TARGETS,
            max_keywords: DEFAULT_MAX_KEYWORDS,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
            thresholds: ScoreThresholds::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Bound (or unbound, with `None`) the waiter queue.
    pub fn with_max_queued(mut self, max: Option<usize>) -> Self {
        self.max_queued = max;
        self
    }

    /// Set a deadline for acquiring an execution slot.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the result cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the result cache capacity.
    pub fn with_max_size(mut self, max: usize) -> Self {
        self.cache_max_size = max;
        self
    }

    /// Set the janitor sweep interval.
    pub fn with_janitor_interval(mut self, interval: Duration) -> Self {
        self.janitor_interval = interval;
        self
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the inter-chunk pacing policy.
    pub fn with_chunk_pacing(mut self, pacing: ChunkPacing) -> Self {
        self.chunk_pacing = pacing;
        self
    }

    /// Set the per-target analyzer timeout.
    pub fn with_target_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.target_timeout = timeout;
        self
    }

    /// Set the maximum number of distinct targets per request.
    pub fn with_max_targets(mut self, max: usize) -> Self {
        self.max_targets = max;
        self
    }

    /// Set the recommendation thresholds.
    pub fn with_thresholds(mut self, thresholds: ScoreThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Load defaults overridden by `SITELENS_*` environment variables.
    ///
    /// # Environment Variables
    /// - `SITELENS_MAX_CONCURRENT`: Concurrency ceiling (default: 3)
    /// - `SITELENS_MAX_QUEUED`: Waiter queue bound, `unbounded` to disable (default: 64)
    /// - `SITELENS_ACQUIRE_TIMEOUT_MS`: Slot acquisition deadline, 0 for none (default: 0)
    /// - `SITELENS_CACHE_TTL_SECS`: Result cache TTL (default: 1800)
    /// - `SITELENS_CACHE_MAX_SIZE`: Result cache capacity (default: 100)
    /// - `SITELENS_JANITOR_INTERVAL_SECS`: Janitor sweep interval (default: 300)
    /// - `SITELENS_CHUNK_SIZE`: Targets per chunk (default: 3)
    /// - `SITELENS_CHUNKS_PER_SECOND`: Chunk admission rate, 0 for none (default: 10)
    /// - `SITELENS_CHUNK_PAUSE_MS`: Fixed inter-chunk pause, used when no rate is set
    /// - `SITELENS_TARGET_TIMEOUT_MS`: Per-target timeout, 0 for none (default: 30000)
    /// - `SITELENS_MAX_TARGETS`: Distinct targets per request (default: 50)
    pub fn from_env() -> SiteLensResult<Self> {
        let overrides = ConfigOverrides {
            max_concurrent: env_parse("SITELENS_MAX_CONCURRENT")?,
            max_queued: match std::env::var("SITELENS_MAX_QUEUED").ok() {
                Some(v) if v.eq_ignore_ascii_case("unbounded") => Some(QueueBound::Unbounded),
                Some(v) => Some(QueueBound::Limit(parse_value("SITELENS_MAX_QUEUED", &v)?)),
                None => None,
            },
            acquire_timeout_ms: env_parse("SITELENS_ACQUIRE_TIMEOUT_MS")?,
            cache_ttl_secs: env_parse("SITELENS_CACHE_TTL_SECS")?,
            cache_max_size: env_parse("SITELENS_CACHE_MAX_SIZE")?,
            janitor_interval_secs: env_parse("SITELENS_JANITOR_INTERVAL_SECS")?,
            chunk_size: env_parse("SITELENS_CHUNK_SIZE")?,
            chunks_per_second: env_parse("SITELENS_CHUNKS_PER_SECOND")?,
            chunk_pause_ms: env_parse("SITELENS_CHUNK_PAUSE_MS")?,
            target_timeout_ms: env_parse("SITELENS_TARGET_TIMEOUT_MS")?,
            max_targets: env_parse("SITELENS_MAX_TARGETS")?,
            ..ConfigOverrides::default()
        };

        let config = overrides.apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by the `[orchestrator]` table of a TOML document.
    ///
    /// ```toml
    /// [orchestrator]
    /// max_concurrent = 4
    /// cache_ttl_secs = 600
    /// chunks_per_second = 0
    /// ```
    pub fn from_toml_str(source: &str) -> SiteLensResult<Self> {
        let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let config = file.orchestrator.unwrap_or_default().apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(SiteLensError::Config) if invalid.
    pub fn validate(&self) -> SiteLensResult<()> {
        require_positive("max_concurrent", self.max_concurrent)?;
        require_positive("cache_max_size", self.cache_max_size)?;
        require_positive("chunk_size", self.chunk_size)?;
        require_positive("max_targets", self.max_targets)?;

        if self.cache_ttl.is_zero() {
            return Err(invalid(
                "cache_ttl",
                format!("{:?}", self.cache_ttl),
                "cache_ttl must be positive",
            ));
        }

        if self.janitor_interval.is_zero() {
            return Err(invalid(
                "janitor_interval",
                format!("{:?}", self.janitor_interval),
                "janitor_interval must be positive",
            ));
        }

        if let Some(timeout) = self.target_timeout {
            if timeout.is_zero() {
                return Err(invalid(
                    "target_timeout",
                    format!("{:?}", timeout),
                    "target_timeout must be positive",
                ));
            }
        }

        if let Some(timeout) = self.acquire_timeout {
            if timeout.is_zero() {
                return Err(invalid(
                    "acquire_timeout",
                    format!("{:?}", timeout),
                    "acquire_timeout must be positive",
                ));
            }
        }

        match self.chunk_pacing {
            ChunkPacing::RateLimited { chunks_per_second: 0 } => {
                return Err(invalid(
                    "chunk_pacing",
                    "0".to_string(),
                    "chunks_per_second must be greater than 0",
                ));
            }
            ChunkPacing::Pause(pause) if pause > MAX_CHUNK_PAUSE => {
                return Err(invalid(
                    "chunk_pacing",
                    format!("{:?}", pause),
                    "chunk pause must not exceed 10s",
                ));
            }
            _ => {}
        }

        let thresholds = self.thresholds;
        if thresholds.needs_attention > 100 || thresholds.critical >= thresholds.needs_attention {
            return Err(invalid(
                "thresholds",
                format!("{}/{}", thresholds.needs_attention, thresholds.critical),
                "thresholds must satisfy critical < needs_attention <= 100",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// OVERRIDES (shared by env and TOML loading)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueBound {
    Limit(usize),
    Unbounded,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    orchestrator: Option<ConfigOverrides>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    max_concurrent: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_queue_bound")]
    max_queued: Option<QueueBound>,
    acquire_timeout_ms: Option<u64>,
    cache_ttl_secs: Option<u64>,
    cache_max_size: Option<usize>,
    janitor_interval_secs: Option<u64>,
    chunk_size: Option<usize>,
    chunks_per_second: Option<u32>,
    chunk_pause_ms: Option<u64>,
    target_timeout_ms: Option<u64>,
    max_targets: Option<usize>,
    max_keywords: Option<usize>,
    max_recommendations: Option<usize>,
    needs_attention_threshold: Option<u8>,
    critical_threshold: Option<u8>,
}

fn deserialize_queue_bound<'de, D>(deserializer: D) -> Result<Option<QueueBound>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Limit(usize),
        Word(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Limit(n)) => Ok(Some(QueueBound::Limit(n))),
        Some(Raw::Word(w)) if w.eq_ignore_ascii_case("unbounded") => {
            Ok(Some(QueueBound::Unbounded))
        }
        Some(Raw::Word(w)) => Err(serde::de::Error::custom(format!(
            "max_queued must be a number or \"unbounded\", got {w}"
        ))),
    }
}

impl ConfigOverrides {
    fn apply(self, mut config: OrchestratorConfig) -> OrchestratorConfig {
        if let Some(v) = self.max_concurrent {
            config.max_concurrent = v;
        }
        if let Some(bound) = self.max_queued {
            config.max_queued = match bound {
                QueueBound::Limit(n) => Some(n),
                QueueBound::Unbounded => None,
            };
        }
        if let Some(ms) = self.acquire_timeout_ms {
            config.acquire_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = self.cache_max_size {
            config.cache_max_size = v;
        }
        if let Some(secs) = self.janitor_interval_secs {
            config.janitor_interval = Duration::from_secs(secs);
        }
        if let Some(v) = self.chunk_size {
            config.chunk_size = v;
        }
        match (self.chunks_per_second, self.chunk_pause_ms) {
            (Some(rate), _) if rate > 0 => {
                config.chunk_pacing = ChunkPacing::RateLimited {
                    chunks_per_second: rate,
                };
            }
            (_, Some(ms)) if ms > 0 => {
                config.chunk_pacing = ChunkPacing::Pause(Duration::from_millis(ms));
            }
            (Some(_), _) | (_, Some(_)) => config.chunk_pacing = ChunkPacing::None,
            (None, None) => {}
        }
        if let Some(ms) = self.target_timeout_ms {
            config.target_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(v) = self.max_targets {
            config.max_targets = v;
        }
        if let Some(v) = self.max_keywords {
            config.max_keywords = v;
        }
        if let Some(v) = self.max_recommendations {
            config.max_recommendations = v;
        }
        if let Some(v) = self.needs_attention_threshold {
            config.thresholds.needs_attention = v;
        }
        if let Some(v) = self.critical_threshold {
            config.thresholds.critical = v;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> SiteLensResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> SiteLensResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(name, raw.to_string(), "not a valid number"))
}

fn require_positive(field: &str, value: usize) -> SiteLensResult<()> {
    if value == 0 {
        return Err(invalid(field, value.to_string(), &format!("{field} must be greater than 0")));
    }
    Ok(())
}

fn invalid(field: &str, value: String, reason: &str) -> SiteLensError {
    SiteLensError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.cache_max_size, 100);
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.chunk_size, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::new()
            .with_max_concurrent(8)
            .with_max_queued(None)
            .with_ttl(Duration::from_secs(60))
            .with_max_size(10)
            .with_chunk_size(5)
            .with_chunk_pacing(ChunkPacing::None)
            .with_target_timeout(None);

        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.max_queued, None);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_max_size, 10);
        assert_eq!(config.chunk_size, 5);
        assert_eq!(config.chunk_pacing, ChunkPacing::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let err = OrchestratorConfig::new().with_max_concurrent(0).validate().unwrap_err();
        match err {
            SiteLensError::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "max_concurrent");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = OrchestratorConfig::new().with_thresholds(ScoreThresholds {
            needs_attention: 40,
            critical: 60,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_long_pause_and_zero_rate() {
        let long_pause = OrchestratorConfig::new()
            .with_chunk_pacing(ChunkPacing::Pause(Duration::from_secs(60)));
        assert!(long_pause.validate().is_err());

        let zero_rate = OrchestratorConfig::new()
            .with_chunk_pacing(ChunkPacing::RateLimited { chunks_per_second: 0 });
        assert!(zero_rate.validate().is_err());
    }

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [orchestrator]
            max_concurrent = 4
            max_queued = "unbounded"
            cache_ttl_secs = 600
            chunks_per_second = 0
            target_timeout_ms = 0
            critical_threshold = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.max_queued, None);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.chunk_pacing, ChunkPacing::None);
        assert_eq!(config.target_timeout, None);
        assert_eq!(config.thresholds.critical, 40);
        assert_eq!(config.cache_max_size, DEFAULT_CACHE_MAX_SIZE);
    }

    #[test]
    fn test_from_toml_pause_pacing() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [orchestrator]
            chunk_pause_ms = 250
            max_queued = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.chunk_pacing, ChunkPacing::Pause(Duration::from_millis(250)));
        assert_eq!(config.max_queued, Some(4));
    }

    #[test]
    fn test_from_toml_empty_document_is_default() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_unknown_fields() {
        let err = OrchestratorConfig::from_toml_str(
            r#"
            [orchestrator]
            max_concurency = 4
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SiteLensError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_toml_runs_validation() {
        let err = OrchestratorConfig::from_toml_str(
            r#"
            [orchestrator]
            chunk_size = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SiteLensError::Config(ConfigError::InvalidValue { .. })));
    }
}
