// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG` wins over the configured level when set. Tagged controller
//! events carry their tag in the `message_id` field, so JSON output can be
//! filtered on it directly.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ReplicationError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, else `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ReplicationError::Config(format!("invalid log level {:?}: {}", level, e)))
}

/// Install the global subscriber.
///
/// `level_override` (e.g. from the command line) replaces the configured
/// level. Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&config.level);
    let filter = env_filter(level)?;

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).flatten_event(true).with_current_span(true))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init(),
    };
    installed.map_err(|e| ReplicationError::Internal(format!("logging already initialized: {}", e)))?;

    tracing::debug!(filter = %level, format = ?config.format, "Logging initialized");
    Ok(())
}
