//! Error types for Harvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only configuration and gateway failures ever surface from a run; parse and
//! per-record validation failures are recovered inside the pipeline.

use std::path::PathBuf;

/// Top-level error type for all Harvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error (missing credential, missing subject, bad TOML).
    #[error("config error: {message}")]
    Config { message: String },

    /// The LLM gateway could not produce raw text.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON/TOML serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data validation error (persisted run mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Failures of a single chat-completion call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Connection, TLS, or timeout failure before a status was received.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a chat-completion document.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// The response carried no choices (or no message content).
    #[error("response contained no choices")]
    NoChoices,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
