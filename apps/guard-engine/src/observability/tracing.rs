//! `tracing` subscriber initialisation.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and `warn` to everything else.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Error installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log level '{level}': {message}")]
    InvalidLevel {
        /// Configured level.
        level: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Build the filter for a configured level.
pub(crate) fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = format!("warn,guard_engine={}", config.level);
    EnvFilter::try_new(&directive).map_err(|e| TracingError::InvalidLevel {
        level: config.level.clone(),
        message: e.to_string(),
    })
}

/// Install the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if the level is invalid or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Json => builder
            .json()
            .with_current_span(false)
            .with_target(true)
            .try_init(),
        LogFormat::Pretty => builder.with_target(false).try_init(),
    };

    result.map_err(|e| TracingError::AlreadyInstalled(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "not a level!!".to_string(),
            format: LogFormat::Pretty,
        };
        let Err(err) = build_filter(&config) else {
            panic!("expected invalid level error");
        };
        assert!(matches!(err, TracingError::InvalidLevel { .. }));
    }

    #[test]
    fn valid_level_builds() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        };
        assert!(build_filter(&config).is_ok());
    }
}
