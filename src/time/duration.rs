//! Duration strings: parsing and canonical formatting.
//!
//! The accepted grammar is `-? ( NUMBER UNIT )+ | -? NUMBER`, with units
//! `y` (365 days), `M` (30 days), `w`, `d`, `h`, `m`, `s` and `ms`. A bare
//! number is a second count: `"500"` is 500 seconds, `"0.5"` is half a
//! second. Canonical formatting uses `y`, `w`, `d`, `h`, `m`, `s` only;
//! `M` is never emitted because 30-day months would make round-trips
//! ambiguous.

use crate::core::error::{Error, Result};

const YEAR: u64 = 31_536_000;
const MONTH: u64 = 2_592_000;
const WEEK: u64 = 604_800;
const DAY: u64 = 86_400;
const HOUR: u64 = 3_600;
const MINUTE: u64 = 60;

/// Units emitted by [`format_duration`], largest first.
const FORMAT_UNITS: [(u64, &str); 5] = [
    (YEAR, "y"),
    (WEEK, "w"),
    (DAY, "d"),
    (HOUR, "h"),
    (MINUTE, "m"),
];

/// Parse a duration string into fractional seconds.
///
/// ```rust
/// use chime::time::duration::parse_duration;
///
/// assert_eq!(parse_duration("1h10s").unwrap(), 3610.0);
/// assert_eq!(parse_duration("-1h").unwrap(), -3600.0);
/// assert_eq!(parse_duration("500").unwrap(), 500.0);
/// ```
///
/// # Errors
///
/// Returns `InvalidDuration` when the input does not match the grammar.
pub fn parse_duration(s: &str) -> Result<f64> {
    parse_duration_opt(s).ok_or_else(|| Error::InvalidDuration(s.to_string()))
}

/// Quiet-mode variant of [`parse_duration`]: `None` instead of an error.
pub fn parse_duration_opt(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if body.is_empty() {
        return None;
    }

    let bytes = body.as_bytes();
    let mut total = 0.0f64;
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let mut seen_dot = false;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !seen_dot)) {
            if bytes[i] == b'.' {
                seen_dot = true;
            }
            i += 1;
        }
        let number: f64 = body[start..i].parse().ok()?;

        if i == bytes.len() {
            // A bare number is a plain second count, but only on its own:
            // "1h30" is not a duration.
            if start == 0 {
                total += number;
                break;
            }
            return None;
        }

        // "ms" shadows "m"; the two-byte unit must be tried first.
        let multiplier = if bytes[i] == b'm' && bytes.get(i + 1) == Some(&b's') {
            i += 2;
            0.001
        } else {
            let m = match bytes[i] {
                b'y' => YEAR as f64,
                b'M' => MONTH as f64,
                b'w' => WEEK as f64,
                b'd' => DAY as f64,
                b'h' => HOUR as f64,
                b'm' => MINUTE as f64,
                b's' => 1.0,
                _ => return None,
            };
            i += 1;
            m
        };
        total += number * multiplier;
    }

    Some(if negative { -total } else { total })
}

/// Format fractional seconds as a canonical duration string.
///
/// ```rust
/// use chime::time::duration::format_duration;
///
/// assert_eq!(format_duration(3661.0), "1h1m1s");
/// assert_eq!(format_duration(7.0 * 24.0 * 3600.0), "1w");
/// assert_eq!(format_duration(-0.5), "-0.5s");
/// ```
#[must_use]
pub fn format_duration(secs: f64) -> String {
    let mut out = String::new();
    if secs < 0.0 {
        out.push('-');
    }
    let magnitude = secs.abs();
    let mut whole = magnitude.floor() as u64;
    let frac = magnitude - magnitude.floor();

    for (unit_secs, label) in FORMAT_UNITS {
        let n = whole / unit_secs;
        if n > 0 {
            out.push_str(&format!("{n}{label}"));
            whole %= unit_secs;
        }
    }

    if frac < 1e-9 {
        if whole > 0 {
            out.push_str(&format!("{whole}s"));
        }
    } else {
        let s = format!("{:.6}", whole as f64 + frac);
        let s = s.trim_end_matches('0').trim_end_matches('.');
        out.push_str(&format!("{s}s"));
    }

    if out.is_empty() || out == "-" {
        return "0s".to_string();
    }
    out
}

/// Convert fractional seconds into a `chrono::Duration` at microsecond
/// resolution.
pub(crate) fn secs_to_chrono(secs: f64) -> chrono::Duration {
    chrono::Duration::microseconds((secs * 1e6).round() as i64)
}

/// A duration argument: either resolved seconds or a spec string still to
/// be parsed.
#[derive(Debug, Clone)]
pub enum SpanSpec {
    /// A resolved second count.
    Seconds(f64),
    /// A duration string such as `"1h10s"`.
    Text(String),
}

impl SpanSpec {
    /// Resolve the spec into fractional seconds.
    pub fn resolve(&self) -> Result<f64> {
        match self {
            SpanSpec::Seconds(secs) => Ok(*secs),
            SpanSpec::Text(text) => parse_duration(text),
        }
    }

    /// The spec as originally supplied, for diagnostics.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            SpanSpec::Seconds(secs) => format_duration(*secs),
            SpanSpec::Text(text) => text.clone(),
        }
    }
}

impl From<f64> for SpanSpec {
    fn from(secs: f64) -> Self {
        SpanSpec::Seconds(secs)
    }
}

impl From<&str> for SpanSpec {
    fn from(text: &str) -> Self {
        SpanSpec::Text(text.to_string())
    }
}

impl From<String> for SpanSpec {
    fn from(text: String) -> Self {
        SpanSpec::Text(text)
    }
}

impl From<std::time::Duration> for SpanSpec {
    fn from(d: std::time::Duration) -> Self {
        SpanSpec::Seconds(d.as_secs_f64())
    }
}
