//! Error types for Shoal
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Shoal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shoal error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Delivery Errors
    // =========================================================================
    #[error("Too many pending messages: permit pool of {max_messages} exhausted")]
    TooManyPendingMessages { max_messages: usize },

    #[error("Actor ref released: mailbox no longer accepts messages")]
    ActorRefReleased,

    #[error("Actor failed: {actor}, reason: {reason}")]
    ActorFailed { actor: String, reason: String },

    // =========================================================================
    // Runtime State Errors
    // =========================================================================
    #[error("Actor runtime is closed")]
    RuntimeClosed,

    #[error("Actor runtime already started")]
    RuntimeAlreadyStarted,

    #[error("Smart actors registry is stopped")]
    RegistryStopped,

    #[error("Smart actors registry already started")]
    RegistryAlreadyStarted,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Configuration load failed: {path}, reason: {reason}")]
    ConfigLoadFailed { path: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a permit-pool exhaustion error
    pub fn too_many_pending(max_messages: usize) -> Self {
        Self::TooManyPendingMessages { max_messages }
    }

    /// Create an actor failure, used by handlers to report unprocessable messages
    pub fn actor_failed(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActorFailed {
            actor: actor.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error is retriable
    ///
    /// Backpressure clears as in-flight messages complete.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TooManyPendingMessages { .. })
    }

    /// Check if this error signals a stale, released mailbox
    pub fn is_released(&self) -> bool {
        matches!(self, Self::ActorRefReleased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::too_many_pending(16);
        assert!(err.to_string().contains("16"));

        let err = Error::actor_failed("counter-7", "negative amount");
        assert!(err.to_string().contains("counter-7"));
        assert!(err.to_string().contains("negative amount"));
    }

    #[test]
    fn test_error_is_retriable() {
        assert!(Error::too_many_pending(1).is_retriable());
        assert!(!Error::ActorRefReleased.is_retriable());
        assert!(!Error::RuntimeClosed.is_retriable());
    }

    #[test]
    fn test_error_is_released() {
        assert!(Error::ActorRefReleased.is_released());
        assert!(!Error::RegistryStopped.is_released());
    }
}
