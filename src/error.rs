//! Centralized error types for mailsink using thiserror.
//!
//! Configuration errors are fatal and surface before the first batch.
//! Everything else is scoped to a single input line or a single message
//! and never escapes the batch loop.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid template in '{field}': {message}")]
    InvalidTemplate { field: String, message: String },
}

/// Errors raised while turning rendered bytes into text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("invalid UTF-8 sequence after byte {valid_up_to}")]
    InvalidEncoding { valid_up_to: usize },
    #[error("render failed: {0}")]
    Transform(String),
}

/// Errors raised while handing one composed message to the SMTP server.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid {field} address '{address}': {message}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        message: String,
    },
    #[error("invalid envelope: {0}")]
    Envelope(String),
    #[error("smtp {class} error: {message}")]
    Smtp {
        class: &'static str,
        message: String,
        detail: Option<String>,
    },
    #[error("message rendering failed: {0}")]
    Render(#[from] RenderError),
}

impl SendError {
    /// Short, stable classification used in log lines and metric labels.
    pub fn class(&self) -> &'static str {
        match self {
            SendError::InvalidAddress { .. } => "invalid_address",
            SendError::Envelope(_) => "envelope",
            SendError::Smtp { class, .. } => class,
            SendError::Render(RenderError::InvalidEncoding { .. }) => "encoding",
            SendError::Render(RenderError::Transform(_)) => "render",
        }
    }

    /// First cause behind this error, when one is known.
    pub fn detail(&self) -> Option<&str> {
        match self {
            SendError::Smtp { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Errors related to host input lines (NDJSON events on stdin).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
