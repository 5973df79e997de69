//! Absolute-time strings with optional embedded IANA timezones.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::core::error::{Error, Result};

/// Naive date-time layouts accepted by [`parse_time_point`].
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an absolute-time string into a UTC instant.
///
/// The string may embed at most one timezone identifier (an IANA name such
/// as `Europe/Berlin`, or a known abbreviation such as `UTC`) anywhere
/// among its whitespace-separated tokens. The identifier is stripped, the remainder
/// is parsed as a naive local date-time, and the result is converted to UTC
/// through the recognised zone. Without a recognised zone the host's local
/// zone is assumed. Strings carrying an explicit RFC 3339 offset parse
/// directly.
///
/// ```rust
/// use chime::time::point::parse_time_point;
///
/// let t = parse_time_point("2030-06-21 12:00:00 UTC").unwrap();
/// assert_eq!(t.to_rfc3339(), "2030-06-21T12:00:00+00:00");
/// ```
///
/// # Errors
///
/// Returns `InvalidTimeString` for unparseable input, more than one timezone
/// token, or a local time that does not exist in the recognised zone.
pub fn parse_time_point(s: &str) -> Result<DateTime<Utc>> {
    let invalid = || Error::InvalidTimeString(s.to_string());
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let mut zone: Option<Tz> = None;
    let mut naive_tokens: Vec<&str> = Vec::new();
    for token in trimmed.split_whitespace() {
        if let Ok(tz) = token.parse::<Tz>() {
            if zone.replace(tz).is_some() {
                return Err(invalid());
            }
        } else {
            naive_tokens.push(token);
        }
    }

    let naive = parse_naive(&naive_tokens.join(" ")).ok_or_else(invalid)?;

    match zone {
        Some(tz) => local_to_utc(&tz, naive).ok_or_else(invalid),
        None => local_to_utc(&Local, naive).ok_or_else(invalid),
    }
}

/// Convert a naive local date-time to UTC in `zone`. Ambiguous local times
/// (clocks rolling back) resolve to the earliest mapping; nonexistent local
/// times (clocks jumping forward) yield `None`.
fn local_to_utc<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// A point-in-time argument: either a resolved instant or a spec string
/// still to be parsed.
#[derive(Debug, Clone)]
pub enum PointSpec {
    /// A resolved UTC instant.
    Absolute(DateTime<Utc>),
    /// A time string such as `"2030-12-12 10:00:00 Europe/Berlin"`.
    Text(String),
}

impl PointSpec {
    /// Resolve the spec into a UTC instant.
    pub fn resolve(&self) -> Result<DateTime<Utc>> {
        match self {
            PointSpec::Absolute(at) => Ok(*at),
            PointSpec::Text(text) => parse_time_point(text),
        }
    }

    /// The spec as originally supplied, for diagnostics.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            PointSpec::Absolute(at) => at.to_rfc3339(),
            PointSpec::Text(text) => text.clone(),
        }
    }
}

impl From<DateTime<Utc>> for PointSpec {
    fn from(at: DateTime<Utc>) -> Self {
        PointSpec::Absolute(at)
    }
}

impl From<&str> for PointSpec {
    fn from(text: &str) -> Self {
        PointSpec::Text(text.to_string())
    }
}

impl From<String> for PointSpec {
    fn from(text: String) -> Self {
        PointSpec::Text(text)
    }
}
