//! Configuration for Shoal
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.
//!
//! The process entry point assembles these structs (usually from a TOML file)
//! and hands them to the runtime and registry constructors.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for Shoal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoalConfig {
    /// Actor runtime (permit pool) configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Keyed registry and eviction sweep configuration
    #[serde(default)]
    pub smart_actors: SmartActorsConfig,
}

impl ShoalConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.runtime.validate()?;
        self.smart_actors.validate()?;
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::invalid_config("<toml>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Actor runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Size of the permit pool shared by all mailboxes of one runtime
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// How long `stop()` waits for outstanding messages (milliseconds)
    #[serde(default = "default_runtime_shutdown_wait_ms")]
    pub shutdown_wait_time_ms: u64,
}

fn default_max_messages() -> usize {
    RUNTIME_MESSAGES_COUNT_DEFAULT
}

fn default_runtime_shutdown_wait_ms() -> u64 {
    RUNTIME_SHUTDOWN_WAIT_MS_DEFAULT
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            shutdown_wait_time_ms: default_runtime_shutdown_wait_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration with the given permit pool size
    pub fn with_max_messages(max_messages: usize) -> Self {
        Self {
            max_messages,
            ..Default::default()
        }
    }

    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_millis(self.shutdown_wait_time_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::invalid_config(
                "runtime.max_messages",
                "must be greater than 0",
            ));
        }

        if self.max_messages > RUNTIME_MESSAGES_COUNT_MAX {
            return Err(Error::invalid_config(
                "runtime.max_messages",
                format!(
                    "{} exceeds limit {}",
                    self.max_messages, RUNTIME_MESSAGES_COUNT_MAX
                ),
            ));
        }

        if self.shutdown_wait_time_ms > SHUTDOWN_WAIT_MS_MAX {
            return Err(Error::invalid_config(
                "runtime.shutdown_wait_time_ms",
                format!(
                    "{} exceeds limit {}",
                    self.shutdown_wait_time_ms, SHUTDOWN_WAIT_MS_MAX
                ),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Smart Actors
// =============================================================================

/// Keyed registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartActorsConfig {
    /// Period in which every registered actor should receive one ping (milliseconds)
    #[serde(default = "default_ping_period_ms")]
    pub ping_period_ms: u64,

    /// Preferred number of actors pinged per sweep tick
    #[serde(default = "default_preferred_ping_batch_size")]
    pub preferred_ping_batch_size: usize,

    /// Floor for the sleep between sweep ticks (milliseconds)
    #[serde(default = "default_min_ping_batch_period_ms")]
    pub min_ping_batch_period_ms: u64,

    /// How long `stop()` waits for every actor to be destroyed (milliseconds)
    #[serde(default = "default_registry_shutdown_wait_ms")]
    pub shutdown_wait_time_ms: u64,
}

fn default_ping_period_ms() -> u64 {
    PING_PERIOD_MS_DEFAULT
}

fn default_preferred_ping_batch_size() -> usize {
    PING_BATCH_SIZE_PREFERRED_DEFAULT
}

fn default_min_ping_batch_period_ms() -> u64 {
    PING_BATCH_PERIOD_MS_MIN
}

fn default_registry_shutdown_wait_ms() -> u64 {
    REGISTRY_SHUTDOWN_WAIT_MS_DEFAULT
}

impl Default for SmartActorsConfig {
    fn default() -> Self {
        Self {
            ping_period_ms: default_ping_period_ms(),
            preferred_ping_batch_size: default_preferred_ping_batch_size(),
            min_ping_batch_period_ms: default_min_ping_batch_period_ms(),
            shutdown_wait_time_ms: default_registry_shutdown_wait_ms(),
        }
    }
}

impl SmartActorsConfig {
    /// Create a configuration with the given ping period
    pub fn with_ping_period_ms(ping_period_ms: u64) -> Self {
        Self {
            ping_period_ms,
            ..Default::default()
        }
    }

    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_millis(self.shutdown_wait_time_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ping_period_ms == 0 {
            return Err(Error::invalid_config(
                "smart_actors.ping_period_ms",
                "must be greater than 0",
            ));
        }

        if self.min_ping_batch_period_ms == 0 {
            return Err(Error::invalid_config(
                "smart_actors.min_ping_batch_period_ms",
                "must be greater than 0",
            ));
        }

        if self.preferred_ping_batch_size == 0 {
            return Err(Error::invalid_config(
                "smart_actors.preferred_ping_batch_size",
                "must be greater than 0",
            ));
        }

        if self.shutdown_wait_time_ms > SHUTDOWN_WAIT_MS_MAX {
            return Err(Error::invalid_config(
                "smart_actors.shutdown_wait_time_ms",
                format!(
                    "{} exceeds limit {}",
                    self.shutdown_wait_time_ms, SHUTDOWN_WAIT_MS_MAX
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ShoalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.runtime.max_messages, RUNTIME_MESSAGES_COUNT_DEFAULT);
        assert_eq!(
            config.smart_actors.min_ping_batch_period_ms,
            PING_BATCH_PERIOD_MS_MIN
        );
    }

    #[test]
    fn test_zero_max_messages_rejected() {
        let config = RuntimeConfig::with_max_messages(0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "runtime.max_messages"));
    }

    #[test]
    fn test_zero_ping_period_rejected() {
        let config = SmartActorsConfig::with_ping_period_ms(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = ShoalConfig::from_toml_str(
            r#"
            [runtime]
            max_messages = 64

            [smart_actors]
            ping_period_ms = 10000
            preferred_ping_batch_size = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.max_messages, 64);
        assert_eq!(
            config.runtime.shutdown_wait_time_ms,
            RUNTIME_SHUTDOWN_WAIT_MS_DEFAULT
        );
        assert_eq!(config.smart_actors.ping_period_ms, 10_000);
        assert_eq!(config.smart_actors.preferred_ping_batch_size, 4);
        assert_eq!(
            config.smart_actors.shutdown_wait_time_ms,
            REGISTRY_SHUTDOWN_WAIT_MS_DEFAULT
        );
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = ShoalConfig::from_toml_str("[smart_actors]\npreferred_ping_batch_size = 0\n")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ShoalConfig::load("/nonexistent/shoal.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigLoadFailed { .. }));
    }
}
