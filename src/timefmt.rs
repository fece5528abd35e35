//! Time rendering for the time key and the `Date` header.
//!
//! Timestamps are converted by value into the selected zone: UTC, the
//! process-local zone, or a named tz-database zone from `time_locale`.
//! Named zones never go through the process environment, so concurrent
//! batches formatting under different zones cannot observe each other.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::{Display, Write};

/// Fixed RFC 5322 pattern for the `Date` header.
pub const DATE_HEADER_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Zone a timestamp is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Local,
    Named(Tz),
}

impl Zone {
    /// Zone for the time key: explicit locale, else local or UTC.
    pub fn select(time_locale: Option<Tz>, localtime: bool) -> Self {
        match time_locale {
            Some(tz) => Zone::Named(tz),
            None if localtime => Zone::Local,
            None => Zone::Utc,
        }
    }
}

/// Renders epoch seconds with a strftime-style pattern.
#[derive(Debug, Clone)]
pub struct TimeFormatter {
    pattern: Option<String>,
    zone: Zone,
    header_zone: Zone,
}

impl TimeFormatter {
    /// Build a formatter.
    ///
    /// Without a pattern the time key renders as plain epoch-second digits.
    /// The `Date` header always uses `time_locale` when given, else local time.
    pub fn new(pattern: Option<String>, localtime: bool, time_locale: Option<Tz>) -> Self {
        Self {
            pattern,
            zone: Zone::select(time_locale, localtime),
            header_zone: time_locale.map(Zone::Named).unwrap_or(Zone::Local),
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Render `timestamp` with the configured pattern.
    pub fn format(&self, timestamp: i64) -> String {
        match &self.pattern {
            Some(pattern) => self.format_with(timestamp, pattern),
            None => timestamp.to_string(),
        }
    }

    /// Render `timestamp` with an explicit pattern in the configured zone.
    ///
    /// Out-of-range timestamps and patterns chrono refuses fall back to the
    /// epoch digits.
    pub fn format_with(&self, timestamp: i64, pattern: &str) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
            tracing::warn!(timestamp, "Timestamp out of range, rendering epoch seconds");
            return timestamp.to_string();
        };
        match render_in_zone(utc, self.zone, pattern) {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(pattern = %pattern, "Time pattern failed to render, rendering epoch seconds");
                timestamp.to_string()
            }
        }
    }

    /// Render the `Date` header value for `now`.
    pub fn header_date(&self, now: DateTime<Utc>) -> String {
        render_in_zone(now, self.header_zone, DATE_HEADER_FORMAT)
            .unwrap_or_else(|_| now.to_rfc2822())
    }
}

fn render_in_zone(utc: DateTime<Utc>, zone: Zone, pattern: &str) -> Result<String, std::fmt::Error> {
    match zone {
        Zone::Utc => render(utc, &Utc, pattern),
        Zone::Local => render(utc, &Local, pattern),
        Zone::Named(tz) => render(utc, &tz, pattern),
    }
}

fn render<Z>(utc: DateTime<Utc>, zone: &Z, pattern: &str) -> Result<String, std::fmt::Error>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    let mut out = String::new();
    write!(out, "{}", utc.with_timezone(zone).format(pattern))?;
    Ok(out)
}

/// Check that chrono understands every specifier in `pattern`.
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        Err(format!("unsupported time format specifier in '{}'", pattern))
    } else {
        Ok(())
    }
}

/// Parse a `time_locale` value as a tz-database zone name.
pub fn parse_time_locale(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|_| format!("'{}' is not a valid timezone", name))
}
