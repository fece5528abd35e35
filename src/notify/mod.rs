//! Per-batch mail dispatch for mailsink.
//!
//! This module turns a batch of records into one SMTP message each:
//! - `destination` resolves To/Cc/Bcc per record
//! - `compose` renders subject/body and builds the raw message text
//! - `transport` hands the message to the SMTP server
//!
//! # Architecture
//!
//! ```text
//! input.rs -> MailSink::process -> compose -> transport -> SMTP server
//! ```
//!
//! # Failure isolation
//!
//! Messages are sent sequentially in record order, one session each. A
//! failed message is logged with a single warning and counted; the rest of
//! the batch still goes out and [`MailSink::process`] never returns an error.

pub mod compose;
pub mod destination;
pub mod transport;

use crate::config::RuntimeConfig;
use crate::error::{ConfigError, SendError};
use crate::record::Record;
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

pub use compose::{MessageComposer, OutgoingMail, RenderedMessage};
pub use destination::{AddressSource, Destination, DestinationConfig, RecipientKind};
pub use transport::{MailTransport, SmtpMailTransport};

/// Result of dispatching one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// The mail output sink: composes and sends one message per record.
///
/// Holds only immutable state, so concurrent batches can share one sink
/// behind an `Arc`.
pub struct MailSink {
    composer: MessageComposer,
    transport: Arc<dyn MailTransport>,
    host: String,
    port: u16,
}

impl MailSink {
    /// Create a sink that sends through the configured SMTP server.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the SMTP transport cannot be built.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        let transport = SmtpMailTransport::from_settings(&config.smtp)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a sink with a custom transport.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mock = Arc::new(MockMailTransport::new());
    /// let sink = MailSink::with_transport(&runtime_config, mock.clone());
    /// ```
    pub fn with_transport(config: &RuntimeConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            composer: MessageComposer::new(
                config.render.clone(),
                config.destination.clone(),
                config.from.clone(),
                config.content_type.clone(),
            ),
            transport,
            host: config.smtp.host.clone(),
            port: config.smtp.port,
        }
    }

    pub fn composer(&self) -> &MessageComposer {
        &self.composer
    }

    /// Send one message per record, in order, isolating failures.
    ///
    /// # Returns
    ///
    /// One [`DispatchOutcome`] per record, in record order.
    pub async fn process(&self, tag: &str, records: &[Record]) -> Vec<DispatchOutcome> {
        let span = tracing::info_span!("process_batch", tag = %tag, records = records.len());

        async {
            let mut outcomes = Vec::with_capacity(records.len());
            for record in records {
                metrics::counter!("mailsink_records_received_total").increment(1);
                outcomes.push(self.dispatch(tag, record).await);
            }

            let sent = outcomes.iter().filter(|o| o.is_sent()).count();
            tracing::debug!(
                sent,
                failed = outcomes.len() - sent,
                "Batch dispatch complete"
            );
            outcomes
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, tag: &str, record: &Record) -> DispatchOutcome {
        let message = match self.composer.compose(tag, record) {
            Ok(message) => message,
            Err(e) => {
                return self.fail("", "", &SendError::from(e));
            }
        };

        let mail = self.composer.to_outgoing(&message, Utc::now());
        match self.transport.send_mail(&mail).await {
            Ok(()) => {
                tracing::debug!(
                    message_id = %mail.message_id,
                    subject = %message.subject,
                    "Mail sent"
                );
                metrics::counter!("mailsink_messages_sent_total").increment(1);
                DispatchOutcome::Sent
            }
            Err(e) => self.fail(&message.subject, &message.body, &e),
        }
    }

    fn fail(&self, subject: &str, body: &str, error: &SendError) -> DispatchOutcome {
        tracing::warn!(
            host = %self.host,
            port = self.port,
            subject = %subject,
            body = %body,
            error_class = error.class(),
            error = %error,
            error_source = error.detail().unwrap_or(""),
            "Failed to send mail, continuing with next record"
        );
        metrics::counter!(
            "mailsink_messages_failed_total",
            "error_class" => error.class()
        )
        .increment(1);
        DispatchOutcome::Failed {
            reason: error.to_string(),
        }
    }
}

impl std::fmt::Debug for MailSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSink")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("composer", &self.composer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
