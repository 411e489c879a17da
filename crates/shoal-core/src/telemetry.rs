//! Logging initialisation
//!
//! TigerStyle: Explicit telemetry configuration, one subscriber per process.
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (falling
//! back to the configured level).

use crate::constants::SERVICE_NAME_DEFAULT;
use crate::error::{Error, Result};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Whether to output logs to stdout
    pub stdout_enabled: bool,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Include the module path of each event
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME_DEFAULT.to_string(),
            stdout_enabled: true,
            log_level: "info".to_string(),
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Disable stdout logging
    pub fn without_stdout(mut self) -> Self {
        self.stdout_enabled = false;
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Omit module paths from log lines
    pub fn without_target(mut self) -> Self {
        self.with_target = false;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - `SHOAL_SERVICE_NAME`: Service name (default: "shoal")
    /// - `RUST_LOG`: Log level filter (default: "info")
    pub fn from_env() -> Self {
        let service_name = std::env::var("SHOAL_SERVICE_NAME")
            .unwrap_or_else(|_| SERVICE_NAME_DEFAULT.to_string());
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            service_name,
            log_level,
            ..Default::default()
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Fails if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,ignore
/// use shoal_core::telemetry::{init_telemetry, TelemetryConfig};
///
/// init_telemetry(TelemetryConfig::new("orders").with_log_level("debug"))?;
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = if config.stdout_enabled {
        Some(tracing_subscriber::fmt::layer().with_target(config.with_target))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("failed to initialize tracing subscriber: {}", e)))?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");

    Ok(())
}
