//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors found while loading or validating `examguard.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The webhook URL is empty, usually an unset `${VAR}` reference.
    #[error("webhook url is empty (set EXAMGUARD_WEBHOOK_URL or [sink].url)")]
    MissingUrl,

    /// A setting is out of range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
