//! SMTP transport for composed messages.
//!
//! [`MailTransport`] is the seam between the dispatcher and the network:
//! production uses [`SmtpMailTransport`], tests inject a recording mock.

use super::compose::OutgoingMail;
use crate::config::{SmtpSettings, TlsMode};
use crate::error::{ConfigError, SendError};
use async_trait::async_trait;
use lettre::address::{Address, Envelope};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::error::Error as _;

/// Hands one composed message to a mail server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `mail` in its own session.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The server accepted the message
    /// * `Err(SendError)` - Address, envelope or SMTP failure
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<(), SendError>;
}

/// Real SMTP transport built on `AsyncSmtpTransport<Tokio1Executor>`.
///
/// Connection pooling is not compiled in, so every call to
/// [`MailTransport::send_mail`] opens and closes its own session.
pub struct SmtpMailTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    /// Build the transport from resolved SMTP settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the TLS parameters cannot
    /// be built.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, ConfigError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .hello_name(ClientId::Domain(settings.domain.clone()))
            .timeout(Some(settings.timeout));

        if settings.tls != TlsMode::None {
            let parameters = TlsParameters::builder(settings.host.clone())
                .dangerous_accept_invalid_certs(!settings.tls_verify)
                .build()
                .map_err(|e| {
                    ConfigError::ValidationError(format!("TLS configuration error: {}", e))
                })?;
            builder = match settings.tls {
                TlsMode::StarttlsAuto => builder.tls(Tls::Opportunistic(parameters)),
                _ => builder.tls(Tls::Wrapper(parameters)),
            };
        }

        if let Some((user, password)) = &settings.credentials {
            builder = builder
                .credentials(Credentials::new(
                    user.clone(),
                    password.expose().to_string(),
                ))
                .authentication(vec![Mechanism::Plain]);
        }

        Ok(Self {
            inner: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<(), SendError> {
        let envelope = build_envelope(mail)?;
        match self.inner.send_raw(&envelope, mail.raw.as_bytes()).await {
            Ok(response) => {
                tracing::debug!(
                    code = %response.code(),
                    message_id = %mail.message_id,
                    "Message accepted"
                );
                Ok(())
            }
            Err(e) => Err(SendError::Smtp {
                class: classify(&e),
                message: e.to_string(),
                detail: e.source().map(|s| s.to_string()),
            }),
        }
    }
}

impl std::fmt::Debug for SmtpMailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailTransport").finish_non_exhaustive()
    }
}

/// Envelope sender and every To, Cc and Bcc recipient of `mail`.
///
/// # Errors
/// Returns [`SendError::InvalidAddress`] for an unparsable address and
/// [`SendError::Envelope`] when there are no recipients at all.
pub fn build_envelope(mail: &OutgoingMail) -> Result<Envelope, SendError> {
    let from = parse_address("from", &mail.from)?;
    let mut recipients = Vec::new();
    for (field, list) in [("to", &mail.to), ("cc", &mail.cc), ("bcc", &mail.bcc)] {
        for address in list {
            recipients.push(parse_address(field, address)?);
        }
    }
    Envelope::new(Some(from), recipients).map_err(|e| SendError::Envelope(e.to_string()))
}

fn parse_address(field: &'static str, address: &str) -> Result<Address, SendError> {
    address
        .parse::<Mailbox>()
        .map(|mailbox| mailbox.email)
        .map_err(|e| SendError::InvalidAddress {
            field,
            address: address.to_string(),
            message: e.to_string(),
        })
}

fn classify(error: &lettre::transport::smtp::Error) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_tls() {
        "tls"
    } else if error.is_permanent() {
        "permanent"
    } else if error.is_transient() {
        "transient"
    } else if error.is_response() {
        "response"
    } else if error.is_client() {
        "client"
    } else {
        "connection"
    }
}
