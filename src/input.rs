//! Host input: newline-delimited JSON events read from stdin.
//!
//! Each line carries one event:
//!
//! ```json
//! {"tag":"app.error","time":1700000000,"record":{"value":"disk full"}}
//! ```
//!
//! `tag` and `time` are optional. Consecutive events with the same tag are
//! grouped into batches and handed to [`MailSink::process`]. A batch is
//! flushed when the tag changes, when it reaches `batch_size`, after
//! `flush_interval` without input, and at end of input or cancellation.
//!
//! # Error Handling
//!
//! A malformed line is logged, counted with [`record_parse_error`] and
//! skipped. It never ends the input loop.

use crate::config::InputConfig;
use crate::error::ParseError;
use crate::notify::MailSink;
use crate::record::Record;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: String,
    pub record: Record,
}

/// Records sharing a tag, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub tag: String,
    pub records: Vec<Record>,
}

/// Counters for one run of the input loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    pub lines: u64,
    pub parse_errors: u64,
    pub batches: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Parse one NDJSON event line.
///
/// # Arguments
///
/// * `line` - Raw line without the trailing newline
/// * `default_tag` - Tag used when the event carries none
/// * `now` - Timestamp used when the event carries no `time`
///
/// # Errors
/// Returns [`ParseError::InvalidJson`] if the line is not JSON and
/// [`ParseError::InvalidEvent`] if it is not a well-formed event.
pub fn parse_event_line(line: &[u8], default_tag: &str, now: i64) -> Result<Event, ParseError> {
    let value: Value =
        serde_json::from_slice(line).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let Value::Object(mut event) = value else {
        return Err(ParseError::InvalidEvent(
            "event must be a JSON object".to_string(),
        ));
    };

    let tag = match event.remove("tag") {
        None | Some(Value::Null) => default_tag.to_string(),
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(ParseError::InvalidEvent("'tag' must be a string".to_string()));
        }
    };

    let timestamp = match event.remove("time") {
        None | Some(Value::Null) => now,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(|| ParseError::InvalidEvent(format!("'time' out of range: {}", n)))?,
        Some(_) => {
            return Err(ParseError::InvalidEvent(
                "'time' must be epoch seconds".to_string(),
            ));
        }
    };

    let record = match event.remove("record") {
        Some(Value::Object(fields)) => Record::from_json(timestamp, fields),
        Some(_) => {
            return Err(ParseError::InvalidEvent(
                "'record' must be a JSON object".to_string(),
            ));
        }
        None => {
            return Err(ParseError::InvalidEvent("missing 'record'".to_string()));
        }
    };

    Ok(Event { tag, record })
}

/// Log and count a rejected input line.
pub fn record_parse_error(line_number: u64, error: &ParseError) {
    let error_type = match error {
        ParseError::InvalidJson(_) => "invalid_json",
        ParseError::InvalidEvent(_) => "invalid_event",
    };

    tracing::warn!(
        line = line_number,
        error = %error,
        "Skipping malformed input line"
    );

    metrics::counter!(
        "mailsink_input_parse_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Groups consecutive events into per-tag batches.
#[derive(Debug)]
pub struct BatchAssembler {
    batch_size: usize,
    tag: String,
    records: Vec<Record>,
}

impl BatchAssembler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            tag: String::new(),
            records: Vec::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.records.is_empty()
    }

    /// Add an event, returning every batch that became ready (at most two).
    pub fn push(&mut self, event: Event) -> Vec<Batch> {
        let mut ready = Vec::new();
        if self.has_pending() && self.tag != event.tag {
            ready.extend(self.finish());
        }
        if !self.has_pending() {
            self.tag = event.tag;
        }
        self.records.push(event.record);
        if self.records.len() >= self.batch_size {
            ready.extend(self.finish());
        }
        ready
    }

    /// Take the pending batch, if any.
    pub fn finish(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }
        Some(Batch {
            tag: std::mem::take(&mut self.tag),
            records: std::mem::take(&mut self.records),
        })
    }
}

/// Read events from `reader` and dispatch them until end of input or
/// cancellation, flushing the last partial batch either way.
///
/// # Errors
/// Returns an I/O error if reading from `reader` fails.
pub async fn run<R>(
    reader: R,
    sink: &MailSink,
    config: &InputConfig,
    cancel: CancellationToken,
) -> std::io::Result<InputStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut assembler = BatchAssembler::new(config.batch_size);
    let mut stats = InputStats::default();

    tracing::info!(
        batch_size = config.batch_size,
        flush_interval = ?config.flush_interval,
        "Reading events from input"
    );

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!("Input loop cancelled");
                break;
            }
            segment = lines.next_segment() => {
                let Some(line) = segment? else {
                    tracing::info!("End of input");
                    break;
                };
                stats.lines += 1;
                let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match parse_event_line(line, &config.default_tag, chrono::Utc::now().timestamp()) {
                    Ok(event) => {
                        for batch in assembler.push(event) {
                            dispatch(sink, batch, &mut stats).await;
                        }
                    }
                    Err(e) => {
                        stats.parse_errors += 1;
                        record_parse_error(stats.lines, &e);
                    }
                }
            }
            _ = tokio::time::sleep(config.flush_interval), if assembler.has_pending() => {
                if let Some(batch) = assembler.finish() {
                    dispatch(sink, batch, &mut stats).await;
                }
            }
        }
    }

    if let Some(batch) = assembler.finish() {
        dispatch(sink, batch, &mut stats).await;
    }

    tracing::info!(
        lines = stats.lines,
        batches = stats.batches,
        sent = stats.sent,
        failed = stats.failed,
        parse_errors = stats.parse_errors,
        "Input loop finished"
    );
    Ok(stats)
}

async fn dispatch(sink: &MailSink, batch: Batch, stats: &mut InputStats) {
    let outcomes = sink.process(&batch.tag, &batch.records).await;
    stats.batches += 1;
    for outcome in outcomes {
        if outcome.is_sent() {
            stats.sent += 1;
        } else {
            stats.failed += 1;
        }
    }
}
