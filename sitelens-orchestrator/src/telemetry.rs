//! Tracing Subscriber Initialization
//!
//! Sets up `tracing-subscriber` with an `EnvFilter` and either human-readable
//! or JSON output. Library code only emits events; binaries call
//! [`init_tracing`] once at startup.

use crate::constants::{DEFAULT_LOG_FILTER, DEFAULT_SERVICE_NAME};
use sitelens_core::{ConfigError, SiteLensResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name for the startup event
    pub service_name: String,
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Emit JSON lines instead of the pretty formatter
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Create TelemetryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SITELENS_SERVICE_NAME`: Service name (default: sitelens)
    /// - `SITELENS_LOG_FILTER`: Fallback filter when `RUST_LOG` is unset
    /// - `SITELENS_LOG_JSON`: `true` or `1` for JSON output (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("SITELENS_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            default_filter: std::env::var("SITELENS_LOG_FILTER")
                .unwrap_or(defaults.default_filter),
            json: std::env::var("SITELENS_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.json),
        }
    }

    /// Force JSON output on or off.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> SiteLensResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| ConfigError::Parse {
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(
        service_name = %config.service_name,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "sitelens");
        assert!(config.default_filter.contains("sitelens=debug"));
        assert!(!config.json);
    }

    #[test]
    fn test_with_json() {
        let config = TelemetryConfig::default().with_json(true);
        assert!(config.json);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default();
        // The first call may or may not succeed depending on test ordering;
        // a second call in the same process must always fail.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
