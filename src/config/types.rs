//! Core configuration types and loading.

use super::env::resolve_env_vars;
use super::smtp::{SmtpOptions, default_true};
use crate::error::ConfigError;
use crate::template::RenderConfig;
use lettre::message::Mailbox;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mailsink/config.yaml";

/// Default `Content-Type` header value.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Main configuration structure for mailsink.
///
/// Option names follow the flat `key: value` layout of the sink options;
/// only `metrics` and `input` are nested sections.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub smtp: SmtpOptions,
    #[serde(flatten)]
    pub envelope: EnvelopeOptions,
    #[serde(flatten)]
    pub render: RenderOptions,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Host input (stdin) batching.
    #[serde(default)]
    pub input: InputConfig,
}

/// Sender, recipients and message headers.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeOptions {
    #[serde(default = "default_from")]
    pub from: String,
    /// Static comma-joined recipient lists.
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub bcc: String,
    /// Record fields that override the static lists per message.
    #[serde(default)]
    pub to_key: Option<String>,
    #[serde(default)]
    pub cc_key: Option<String>,
    #[serde(default)]
    pub bcc_key: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

/// Subject/body templates and time rendering options.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "key_list")]
    pub message_out_keys: Vec<String>,
    /// Key-value body used when `message` is absent.
    #[serde(default, deserialize_with = "key_list")]
    pub out_keys: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default, deserialize_with = "key_list")]
    pub subject_out_keys: Vec<String>,
    #[serde(default)]
    pub time_key: Option<String>,
    #[serde(default)]
    pub time_format: Option<String>,
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
    #[serde(default = "default_true")]
    pub localtime: bool,
    /// tz-database zone name, e.g. "Asia/Tokyo".
    #[serde(default)]
    pub time_locale: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            message: None,
            message_out_keys: Vec::new(),
            out_keys: Vec::new(),
            subject: default_subject(),
            subject_out_keys: Vec::new(),
            time_key: None,
            time_format: None,
            tag_key: default_tag_key(),
            localtime: true,
            time_locale: None,
        }
    }
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// How stdin events are grouped into batches.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Flush a pending batch after this long without input.
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Tag for events that carry none.
    #[serde(default = "default_input_tag")]
    pub default_tag: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
            default_tag: default_input_tag(),
        }
    }
}

fn default_from() -> String {
    "localhost@localdomain".to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_subject() -> String {
    "mailsink notification".to_string()
}

fn default_tag_key() -> String {
    "tag".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_input_tag() -> String {
    "mailsink".to_string()
}

/// Accepts either `"a,b,c"` or a YAML sequence.
fn key_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawKeys {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match RawKeys::deserialize(deserializer)? {
        RawKeys::Joined(joined) => split_list(&joined),
        RawKeys::List(list) => list
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect(),
    })
}

/// Split a comma-joined list, trimming entries and dropping empty ones.
pub fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the whole configuration, collecting every error.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if let Err(render_errors) = RenderConfig::compile(&self.render) {
            errors.extend(render_errors);
        }

        if self.smtp.host.trim().is_empty() {
            errors.push(ConfigError::ValidationError(
                "host must not be empty".to_string(),
            ));
        }

        if let Some(user) = &self.smtp.user
            && let Err(e) = resolve_env_vars(user)
        {
            errors.push(ConfigError::ValidationError(format!("user: {}", e)));
        }
        if let Some(password) = &self.smtp.password
            && let Err(e) = resolve_env_vars(password.expose())
        {
            errors.push(ConfigError::ValidationError(format!("password: {}", e)));
        }

        if let Err(e) = self.envelope.from.parse::<Mailbox>() {
            errors.push(ConfigError::ValidationError(format!(
                "invalid 'from' address '{}': {}",
                self.envelope.from, e
            )));
        }

        for (field, list) in [
            ("to", &self.envelope.to),
            ("cc", &self.envelope.cc),
            ("bcc", &self.envelope.bcc),
        ] {
            for address in split_list(list) {
                if let Err(e) = address.parse::<Mailbox>() {
                    errors.push(ConfigError::ValidationError(format!(
                        "invalid '{}' address '{}': {}",
                        field, address, e
                    )));
                }
            }
        }

        if self.envelope.content_type.contains(['\r', '\n']) {
            errors.push(ConfigError::ValidationError(
                "content_type must be a single line".to_string(),
            ));
        }

        if self.input.batch_size == 0 {
            errors.push(ConfigError::ValidationError(
                "input.batch_size must be greater than 0".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
