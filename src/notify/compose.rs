//! Message composition: rendered text, recipients and transport headers.

use super::destination::{Destination, DestinationConfig, RecipientKind};
use crate::error::RenderError;
use crate::record::Record;
use crate::scrub::{decode_utf8, scrub};
use crate::template::RenderConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

const MESSAGE_ID_TOKEN_LEN: usize = 24;

/// Subject, body and recipients for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    pub destination: Destination,
}

/// Raw message text plus the envelope handed to the SMTP session.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    /// Header block, blank line and body, with CRLF line endings.
    pub raw: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub message_id: String,
}

impl OutgoingMail {
    /// Every envelope recipient, To then Cc then Bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }
}

/// Builds [`RenderedMessage`]s and their raw text from records.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    render: RenderConfig,
    destination: DestinationConfig,
    from: String,
    content_type: String,
}

impl MessageComposer {
    pub fn new(
        render: RenderConfig,
        destination: DestinationConfig,
        from: String,
        content_type: String,
    ) -> Self {
        Self {
            render,
            destination,
            from,
            content_type,
        }
    }

    /// Render subject and body for `record` and resolve its recipients.
    ///
    /// Both texts pass through the scrubber, so an invalid byte sequence in a
    /// record field becomes `?` rather than an error.
    ///
    /// # Errors
    /// Returns a [`RenderError`] only if the text is still unusable after
    /// repair.
    pub fn compose(&self, tag: &str, record: &Record) -> Result<RenderedMessage, RenderError> {
        let subject = scrub(&self.render.render_subject(record, tag), decode_utf8)?;
        let body = scrub(&self.render.render_body(record, tag), decode_utf8)?;

        Ok(RenderedMessage {
            subject: fold_header_value(&subject),
            body,
            destination: self.destination.resolve(record),
        })
    }

    /// Assemble the raw message text and envelope for `message`.
    pub fn to_outgoing(&self, message: &RenderedMessage, now: DateTime<Utc>) -> OutgoingMail {
        let date = self.render.fields.time_formatter().header_date(now);
        let message_id = generate_message_id();
        let destination = &message.destination;

        let headers = [
            ("Date", date.as_str()),
            ("From", self.from.as_str()),
            ("To", destination.to.as_str()),
            ("Cc", destination.cc.as_str()),
            ("Bcc", destination.bcc.as_str()),
            ("Subject", message.subject.as_str()),
            ("Message-Id", message_id.as_str()),
            ("Mime-Version", "1.0"),
            ("Content-Type", self.content_type.as_str()),
        ];

        let mut raw = String::with_capacity(message.body.len() + 512);
        for (name, value) in headers {
            raw.push_str(name);
            raw.push_str(": ");
            raw.push_str(&fold_header_value(value));
            raw.push_str("\r\n");
        }
        raw.push_str("\r\n");
        raw.push_str(&to_crlf(&message.body));

        OutgoingMail {
            raw,
            from: self.from.clone(),
            to: destination.addresses(RecipientKind::To),
            cc: destination.addresses(RecipientKind::Cc),
            bcc: destination.addresses(RecipientKind::Bcc),
            message_id,
        }
    }
}

/// `<token1@token2>` from two independent random tokens.
pub fn generate_message_id() -> String {
    format!("<{}@{}>", random_token(), random_token())
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MESSAGE_ID_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Header values stay on one line.
fn fold_header_value(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn to_crlf(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + body.len() / 32);
    let mut prev = '\0';
    for c in body.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}
