//! Configuration loading and validation for mailsink.
//!
//! This module handles loading the YAML configuration file, validation,
//! environment variable substitution for credentials, and compilation into
//! the immutable [`RuntimeConfig`] shared by every batch.

mod env;
mod runtime;
mod secret;
mod smtp;
mod types;

// Re-exports publics
pub use env::resolve_env_vars;
pub use runtime::{RuntimeConfig, SmtpSettings};
pub use secret::SecretString;
pub use smtp::{SmtpOptions, TlsMode};
pub use types::{
    Config, DEFAULT_CONFIG_PATH, DEFAULT_CONTENT_TYPE, EnvelopeOptions, InputConfig,
    MetricsConfig, RenderOptions, split_list,
};
