// src/lib.rs
//! mailsink - render structured event records into email notifications and
//! dispatch them over SMTP, one message per record.

pub mod cli;
pub mod config;
pub mod error;
pub mod fields;
pub mod input;
pub mod metrics;
pub mod notify;
pub mod record;
pub mod scrub;
pub mod template;
pub mod timefmt;

// Re-export commonly used types
pub use cli::LogFormat;
pub use fields::FieldResolver;
pub use input::{BatchAssembler, parse_event_line, record_parse_error};
pub use metrics::{MetricsServer, register_metric_descriptions};
pub use notify::{
    DispatchOutcome, MailSink, MailTransport, MessageComposer, OutgoingMail, RenderedMessage,
    SmtpMailTransport,
};
pub use record::{FieldValue, Record};
pub use scrub::scrub;
pub use template::RenderConfig;
pub use timefmt::TimeFormatter;
