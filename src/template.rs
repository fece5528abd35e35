//! Positional message templating.
//!
//! Subjects and templated bodies use printf-style templates where each `%s`
//! consumes the next value of an ordered key list (`%%` is a literal `%`).
//! Placeholder and key counts are checked once when the configuration is
//! compiled, so rendering itself never fails.
//!
//! When no message template is configured the body falls back to key-value
//! lines: `key: value` for ordinary keys, the bare value for the time and
//! tag keys.
//!
//! # Architecture
//!
//! ```text
//! record -> fields.rs -> template.rs -> scrub.rs -> notify/compose.rs
//! ```

use crate::config::RenderOptions;
use crate::error::ConfigError;
use crate::fields::FieldResolver;
use crate::record::Record;
use crate::timefmt::{TimeFormatter, parse_time_locale, validate_pattern};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder,
}

/// A parsed `%s` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PositionalTemplate {
    /// Parse `source`, accepting only `%s` and `%%` directives.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices();

        while let Some((pos, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some((_, 's')) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder);
                }
                Some((_, '%')) => literal.push('%'),
                Some((_, other)) => {
                    return Err(format!(
                        "unsupported format directive '%{}' at byte {}; only %s and %% are allowed",
                        other, pos
                    ));
                }
                None => {
                    return Err(format!("dangling '%' at byte {}", pos));
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder))
            .count()
    }

    /// Substitute `values` positionally.
    ///
    /// Placeholders beyond the supplied values render empty.
    pub fn bind<V: AsRef<[u8]>>(&self, values: &[V]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.source.len());
        let mut values = values.iter();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.extend_from_slice(text.as_bytes()),
                Segment::Placeholder => {
                    if let Some(value) = values.next() {
                        out.extend_from_slice(value.as_ref());
                    }
                }
            }
        }
        out
    }
}

/// A template paired with the keys that feed its placeholders.
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    template: PositionalTemplate,
    keys: Vec<String>,
}

impl BoundTemplate {
    /// Parse `source` and check its placeholder count against `keys`.
    pub fn compile(source: &str, keys: Vec<String>) -> Result<Self, String> {
        let template = PositionalTemplate::parse(source)?;
        let placeholders = template.placeholder_count();
        if placeholders != keys.len() {
            return Err(format!(
                "{} placeholder{} but {} key{} configured",
                placeholders,
                if placeholders == 1 { "" } else { "s" },
                keys.len(),
                if keys.len() == 1 { "" } else { "s" },
            ));
        }
        Ok(Self { template, keys })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn source(&self) -> &str {
        self.template.source()
    }

    /// Render for one record. Without keys only `%%` escapes are applied.
    pub fn render(&self, fields: &FieldResolver, record: &Record, tag: &str) -> Vec<u8> {
        let values = fields.resolve_all(&self.keys, record, tag);
        self.template.bind(&values)
    }
}

/// How the message body is produced.
#[derive(Debug, Clone)]
pub enum BodyTemplate {
    /// `message` + `message_out_keys`, with `\n` escapes expanded.
    Formatted(BoundTemplate),
    /// `out_keys` rendered as newline-joined lines.
    KeyValue(Vec<String>),
}

impl BodyTemplate {
    pub fn render(&self, fields: &FieldResolver, record: &Record, tag: &str) -> Vec<u8> {
        match self {
            BodyTemplate::Formatted(template) => {
                expand_newline_escapes(&template.render(fields, record, tag))
            }
            BodyTemplate::KeyValue(keys) => render_key_value(keys, fields, record, tag),
        }
    }
}

fn render_key_value(keys: &[String], fields: &FieldResolver, record: &Record, tag: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        let value = fields.resolve(key, record, tag);
        if !fields.is_time_key(key) && !fields.is_tag_key(key) {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
        }
        out.extend_from_slice(&value);
    }
    out
}

/// Turn every literal two-byte `\n` sequence into a line break.
pub fn expand_newline_escapes(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'\\' && text.get(i + 1) == Some(&b'n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(text[i]);
            i += 1;
        }
    }
    out
}

/// Immutable rendering configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub body: BodyTemplate,
    pub subject: BoundTemplate,
    pub fields: FieldResolver,
}

impl RenderConfig {
    /// Validate and compile the rendering options.
    ///
    /// # Errors
    /// Returns every problem found, not just the first.
    pub fn compile(options: &RenderOptions) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let body = match &options.message {
            Some(message) => {
                match BoundTemplate::compile(message, options.message_out_keys.clone()) {
                    Ok(t) => Some(BodyTemplate::Formatted(t)),
                    Err(message) => {
                        errors.push(ConfigError::InvalidTemplate {
                            field: "message".to_string(),
                            message,
                        });
                        None
                    }
                }
            }
            None if options.out_keys.is_empty() => {
                errors.push(ConfigError::ValidationError(
                    "either 'message' or 'out_keys' must be specified".to_string(),
                ));
                None
            }
            None => Some(BodyTemplate::KeyValue(options.out_keys.clone())),
        };

        let subject = BoundTemplate::compile(&options.subject, options.subject_out_keys.clone())
            .map_err(|message| {
                errors.push(ConfigError::InvalidTemplate {
                    field: "subject".to_string(),
                    message,
                })
            })
            .ok();

        if let Some(pattern) = &options.time_format
            && let Err(message) = validate_pattern(pattern)
        {
            errors.push(ConfigError::InvalidTemplate {
                field: "time_format".to_string(),
                message,
            });
        }

        let time_locale = match options.time_locale.as_deref().map(parse_time_locale) {
            Some(Ok(tz)) => Some(tz),
            Some(Err(e)) => {
                errors.push(ConfigError::ValidationError(format!("time_locale: {}", e)));
                None
            }
            None => None,
        };

        match (body, subject) {
            (Some(body), Some(subject)) if errors.is_empty() => {
                let time = TimeFormatter::new(
                    options.time_format.clone(),
                    options.localtime,
                    time_locale,
                );
                Ok(Self {
                    body,
                    subject,
                    fields: FieldResolver::new(
                        options.time_key.clone(),
                        options.tag_key.clone(),
                        time,
                    ),
                })
            }
            _ => Err(errors),
        }
    }

    pub fn render_subject(&self, record: &Record, tag: &str) -> Vec<u8> {
        self.subject.render(&self.fields, record, tag)
    }

    pub fn render_body(&self, record: &Record, tag: &str) -> Vec<u8> {
        self.body.render(&self.fields, record, tag)
    }
}
