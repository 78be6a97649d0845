// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication manager.
//!
//! Errors are categorized by where they come from (the replication engine's
//! HTTP API, source discovery, configuration) and carry enough context to
//! tell which group and which operation failed.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Http` | Yes | Transport errors, timeouts, connection refused |
//! | `Engine` | 5xx only | Replication engine answered with an error status |
//! | `NotFound` | No | Job document vanished (deleted concurrently) |
//! | `Discovery` | Yes | Catalog or DNS lookup failed |
//! | `InsufficientSources` | No | `minimal_replications` exceeds the source pool |
//! | `Config` | No | Configuration invalid |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`ReplicationError::is_retryable()`] to decide whether an engine call
//! should be retried with backoff (see [`crate::resilience`]). Anything that
//! is still failing after retries propagates out of the controller task and
//! the supervisor restarts it.

use thiserror::Error;

/// Result type alias for replication manager operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while reconciling replications.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// HTTP transport failure talking to the engine or a discovery backend.
    #[error("HTTP error ({operation}): {message}")]
    Http {
        operation: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The replication engine answered with a non-success status.
    #[error("Engine error ({operation}): status {status}: {message}")]
    Engine {
        operation: String,
        status: u16,
        message: String,
    },

    /// A job document was not found.
    #[error("Replication job not found: {0}")]
    NotFound(String),

    /// Source discovery (catalog or DNS) failed.
    #[error("Discovery error ({strategy}): {message}")]
    Discovery { strategy: String, message: String },

    /// The group asks for more replications than it has sources.
    #[error("Replications count is lower then possible sources list: need {required}, have {available}")]
    InsufficientSources { required: usize, available: usize },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicationError {
    /// Create an HTTP error from a reqwest::Error
    pub fn http(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an HTTP error without source
    pub fn http_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a discovery error
    pub fn discovery(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Engine { status, .. } => *status >= 500,
            Self::NotFound(_) => false,
            Self::Discovery { .. } => true,
            Self::InsufficientSources { .. } => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_yaml::Error> for ReplicationError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_http() {
        let err = ReplicationError::http_msg("GET _active_tasks", "connection reset");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("_active_tasks"));
    }

    #[test]
    fn test_engine_error_retryable_only_for_server_errors() {
        let err = ReplicationError::Engine {
            operation: "GET _replicator".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());

        let err = ReplicationError::Engine {
            operation: "POST _replicator".to_string(),
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_is_retryable_discovery() {
        let err = ReplicationError::discovery("dns", "no such host");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("dns"));
    }

    #[test]
    fn test_not_found() {
        let err = ReplicationError::NotFound("abc".to_string());
        assert!(!err.is_retryable());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_insufficient_sources_formatting() {
        let err = ReplicationError::InsufficientSources {
            required: 3,
            available: 2,
        };
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("need 3"));
        assert!(msg.contains("have 2"));
    }

    #[test]
    fn test_not_retryable_config() {
        let err = ReplicationError::Config("missing target".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_internal() {
        assert!(!ReplicationError::Internal("unexpected".to_string()).is_retryable());
    }

    #[test]
    fn test_yaml_error_converts_to_config() {
        let parsed: std::result::Result<u32, serde_yaml::Error> = serde_yaml::from_str("[not, a, number]");
        let err: ReplicationError = parsed.unwrap_err().into();
        assert!(matches!(err, ReplicationError::Config(_)));
    }
}
