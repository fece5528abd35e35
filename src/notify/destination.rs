//! Per-message recipient resolution.

use crate::config::split_list;
use crate::record::Record;

/// Recipient header kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::To => "to",
            RecipientKind::Cc => "cc",
            RecipientKind::Bcc => "bcc",
        }
    }
}

/// Where one recipient list comes from: an optional record field with the
/// static list as fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSource {
    pub static_value: String,
    pub record_key: Option<String>,
}

impl AddressSource {
    pub fn new(static_value: String, record_key: Option<String>) -> Self {
        Self {
            static_value,
            record_key,
        }
    }

    /// Record field value when present and non-empty, else the static list.
    pub fn resolve(&self, record: &Record) -> String {
        if let Some(key) = &self.record_key
            && let Some(value) = record.get(key)
        {
            let value = value.render_lossy();
            if !value.trim().is_empty() {
                return value.into_owned();
            }
        }
        self.static_value.clone()
    }
}

/// Static and per-record recipient settings for To, Cc and Bcc.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationConfig {
    pub to: AddressSource,
    pub cc: AddressSource,
    pub bcc: AddressSource,
}

impl DestinationConfig {
    pub fn source(&self, kind: RecipientKind) -> &AddressSource {
        match kind {
            RecipientKind::To => &self.to,
            RecipientKind::Cc => &self.cc,
            RecipientKind::Bcc => &self.bcc,
        }
    }

    /// Resolve one recipient kind for `record`. Empty means no recipients.
    pub fn resolve_kind(&self, kind: RecipientKind, record: &Record) -> String {
        self.source(kind).resolve(record)
    }

    /// Resolve all three lists for `record`.
    pub fn resolve(&self, record: &Record) -> Destination {
        Destination {
            to: self.resolve_kind(RecipientKind::To, record),
            cc: self.resolve_kind(RecipientKind::Cc, record),
            bcc: self.resolve_kind(RecipientKind::Bcc, record),
        }
    }
}

/// Resolved comma-joined recipient lists for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destination {
    pub to: String,
    pub cc: String,
    pub bcc: String,
}

impl Destination {
    pub fn list(&self, kind: RecipientKind) -> &str {
        match kind {
            RecipientKind::To => &self.to,
            RecipientKind::Cc => &self.cc,
            RecipientKind::Bcc => &self.bcc,
        }
    }

    /// Individual addresses of one kind.
    pub fn addresses(&self, kind: RecipientKind) -> Vec<String> {
        split_list(self.list(kind))
    }

    pub fn is_empty(&self) -> bool {
        [RecipientKind::To, RecipientKind::Cc, RecipientKind::Bcc]
            .iter()
            .all(|kind| self.addresses(*kind).is_empty())
    }
}
