//! Repair of malformed byte sequences in rendered text.
//!
//! Rendered subjects and bodies are assembled as bytes because record
//! fields may carry raw, non-UTF-8 payloads. [`scrub`] runs a transform over
//! those bytes and, when the transform rejects them as badly encoded,
//! replaces every invalid byte with `?` and runs it exactly once more.

use crate::error::RenderError;

/// Apply `transform` to `text`, repairing invalid encoding at most once.
///
/// Only [`RenderError::InvalidEncoding`] triggers the repair; every other
/// error propagates immediately. A failure on the retry propagates too.
pub fn scrub<T, F>(text: &[u8], mut transform: F) -> Result<T, RenderError>
where
    F: FnMut(&[u8]) -> Result<T, RenderError>,
{
    match transform(text) {
        Err(RenderError::InvalidEncoding { valid_up_to }) => {
            let (repaired, replaced) = replace_invalid_bytes(text);
            tracing::info!(
                valid_up_to,
                replaced_bytes = replaced,
                "Replaced invalid byte sequences with '?'"
            );
            metrics::counter!("mailsink_scrub_replacements_total").increment(1);
            transform(&repaired)
        }
        other => other,
    }
}

/// Transform that decodes UTF-8 text, reporting bad input as `InvalidEncoding`.
pub fn decode_utf8(bytes: &[u8]) -> Result<String, RenderError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| RenderError::InvalidEncoding {
            valid_up_to: e.valid_up_to(),
        })
}

/// Replace each byte of every invalid UTF-8 sequence with `?`.
///
/// Returns the repaired bytes and the number of bytes replaced.
pub fn replace_invalid_bytes(text: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(text.len());
    let mut replaced = 0;
    let mut rest = text;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.extend_from_slice(valid.as_bytes());
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.extend_from_slice(valid);
                // None means a truncated sequence running to the end of input.
                let bad = e.error_len().unwrap_or(after.len());
                out.extend(std::iter::repeat_n(b'?', bad));
                replaced += bad;
                rest = &after[bad..];
            }
        }
    }

    (out, replaced)
}
