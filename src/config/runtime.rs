//! Runtime configuration with pre-compiled templates and resolved credentials.

use super::env::resolve_env_vars;
use super::secret::SecretString;
use super::smtp::TlsMode;
use super::types::{Config, InputConfig, MetricsConfig};
use crate::error::ConfigError;
use crate::notify::destination::{AddressSource, DestinationConfig};
use crate::template::RenderConfig;
use std::time::Duration;

/// Immutable configuration shared by every batch.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub render: RenderConfig,
    pub destination: DestinationConfig,
    pub smtp: SmtpSettings,
    pub from: String,
    pub content_type: String,
    pub metrics: MetricsConfig,
    pub input: InputConfig,
}

/// Resolved SMTP session settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub domain: String,
    /// Present only when both user and password are configured.
    pub credentials: Option<(String, SecretString)>,
    pub tls: TlsMode,
    pub tls_verify: bool,
    pub timeout: Duration,
}

impl Config {
    /// Compile the configuration for runtime.
    ///
    /// Expects [`Config::validate`] to have passed; any error still found is
    /// returned as the first one encountered.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn compile(self) -> Result<RuntimeConfig, ConfigError> {
        let render = RenderConfig::compile(&self.render).map_err(first_error)?;

        let user = self.smtp.user.as_deref().map(resolve_env_vars).transpose()?;
        let password = self
            .smtp
            .password
            .as_ref()
            .map(|p| resolve_env_vars(p.expose()).map(SecretString::new))
            .transpose()?;

        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of user/password is set, SMTP sessions will not authenticate"
                );
                None
            }
        };

        if self.smtp.enable_starttls_auto && self.smtp.enable_tls {
            tracing::warn!("Both enable_starttls_auto and enable_tls are set, using implicit TLS");
        }

        let envelope = self.envelope;
        let destination = DestinationConfig {
            to: AddressSource::new(envelope.to, envelope.to_key),
            cc: AddressSource::new(envelope.cc, envelope.cc_key),
            bcc: AddressSource::new(envelope.bcc, envelope.bcc_key),
        };

        Ok(RuntimeConfig {
            render,
            destination,
            smtp: SmtpSettings {
                host: self.smtp.host,
                port: self.smtp.port,
                domain: self.smtp.domain,
                credentials,
                tls: TlsMode::from_toggles(self.smtp.enable_starttls_auto, self.smtp.enable_tls),
                tls_verify: self.smtp.tls_verify,
                timeout: self.smtp.timeout,
            },
            from: envelope.from,
            content_type: envelope.content_type,
            metrics: self.metrics,
            input: self.input,
        })
    }
}

fn first_error(errors: Vec<ConfigError>) -> ConfigError {
    errors
        .into_iter()
        .next()
        .unwrap_or_else(|| ConfigError::ValidationError("invalid render options".to_string()))
}
