//! SMTP server options.

use super::secret::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// SMTP server configuration, flattened into the top-level config.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpOptions {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name announced in EHLO/HELO.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Username (supports `${ENV_VAR}` substitution).
    #[serde(default)]
    pub user: Option<String>,
    /// Password (supports `${ENV_VAR}` substitution).
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Upgrade to TLS with STARTTLS when the server offers it.
    #[serde(default)]
    pub enable_starttls_auto: bool,
    /// Connect over implicit TLS (SMTPS).
    #[serde(default)]
    pub enable_tls: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// TLS mode for SMTP sessions, derived from the two toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    None,
    StarttlsAuto,
    Tls,
}

impl TlsMode {
    /// Implicit TLS wins when both toggles are set.
    pub fn from_toggles(enable_starttls_auto: bool, enable_tls: bool) -> Self {
        match (enable_starttls_auto, enable_tls) {
            (_, true) => TlsMode::Tls,
            (true, false) => TlsMode::StarttlsAuto,
            (false, false) => TlsMode::None,
        }
    }
}

fn default_port() -> u16 {
    25
}

fn default_domain() -> String {
    "localdomain".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_options_defaults() {
        let opts: SmtpOptions = serde_yaml::from_str("host: smtp.example.com").unwrap();
        assert_eq!(opts.host, "smtp.example.com");
        assert_eq!(opts.port, 25);
        assert_eq!(opts.domain, "localdomain");
        assert!(opts.user.is_none());
        assert!(opts.password.is_none());
        assert!(!opts.enable_starttls_auto);
        assert!(!opts.enable_tls);
        assert!(opts.tls_verify);
        assert_eq!(opts.timeout, Duration::from_secs(60));
    }

    #[test]
    fn smtp_options_parse_all_fields() {
        let yaml = r#"
            host: mail.example.com
            port: 465
            domain: alerts.example.com
            user: bot
            password: s3cret
            enable_starttls_auto: true
            enable_tls: true
            tls_verify: false
            timeout: 15s
        "#;
        let opts: SmtpOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(opts.port, 465);
        assert_eq!(opts.domain, "alerts.example.com");
        assert_eq!(opts.user.as_deref(), Some("bot"));
        assert_eq!(opts.password.as_ref().map(|p| p.expose()), Some("s3cret"));
        assert!(!opts.tls_verify);
        assert_eq!(opts.timeout, Duration::from_secs(15));
    }

    #[test]
    fn smtp_options_require_host() {
        let result: Result<SmtpOptions, _> = serde_yaml::from_str("port: 25");
        assert!(result.is_err());
    }

    #[test]
    fn tls_mode_from_toggles() {
        assert_eq!(TlsMode::from_toggles(false, false), TlsMode::None);
        assert_eq!(TlsMode::from_toggles(true, false), TlsMode::StarttlsAuto);
        assert_eq!(TlsMode::from_toggles(false, true), TlsMode::Tls);
        assert_eq!(TlsMode::from_toggles(true, true), TlsMode::Tls);
    }
}
