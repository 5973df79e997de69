//! Cron expressions and next-fire-time computation.
//!
//! A [`CronLine`] holds one parsed 5- or 6-field cron expression. Five
//! fields are `min hour day-of-month month day-of-week` (firing at second
//! zero); a sixth leading field selects seconds. An optional trailing token
//! names an IANA timezone (`Europe/Berlin`) or a known abbreviation; without
//! one the line is evaluated in UTC.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::core::error::{Error, Result};
use crate::util::clock;

/// Upper bound on carry-search iterations before an expression is declared
/// impossible (e.g. `0 0 30 2 *`).
const MAX_SEARCH_STEPS: usize = 100_000;

/// Days the search may look ahead: leap-year coverage plus slack.
const HORIZON_DAYS: i64 = 4 * 366;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// A parsed cron expression.
///
/// Each field is a matched-value set, `None` meaning "any". Day-of-week 0
/// is Sunday; a literal 7 normalises to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronLine {
    source: String,
    seconds: Option<BTreeSet<u32>>,
    minutes: Option<BTreeSet<u32>>,
    hours: Option<BTreeSet<u32>>,
    days: Option<BTreeSet<u32>>,
    months: Option<BTreeSet<u32>>,
    weekdays: Option<BTreeSet<u32>>,
    timezone: Option<Tz>,
}

impl CronLine {
    /// Parse a cron expression.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCron` for a wrong field count, out-of-range values,
    /// zero steps, inverted ranges, or unrecognised names.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut tokens: Vec<&str> = expr.split_whitespace().collect();

        let mut timezone = None;
        if tokens.len() == 6 || tokens.len() == 7 {
            if let Some(tz) = tokens.last().and_then(|t| t.parse::<Tz>().ok()) {
                timezone = Some(tz);
                tokens.pop();
            }
        }

        let (seconds_token, rest) = match tokens.len() {
            5 => (None, &tokens[..]),
            6 => (Some(tokens[0]), &tokens[1..]),
            n => {
                return Err(invalid(expr, format!("expected 5 or 6 fields, got {n}")));
            }
        };

        let seconds = match seconds_token {
            // Five-field lines fire at second zero.
            None => Some(BTreeSet::from([0])),
            Some(token) => parse_field(expr, token, 0, 59, None)?,
        };
        let minutes = parse_field(expr, rest[0], 0, 59, None)?;
        let hours = parse_field(expr, rest[1], 0, 23, None)?;
        let days = parse_field(expr, rest[2], 1, 31, None)?;
        let months = parse_field(expr, rest[3], 1, 12, Some(&MONTH_NAMES))?;
        let weekdays = parse_field(expr, rest[4], 0, 7, Some(&DAY_NAMES))?.map(|mut set| {
            if set.remove(&7) {
                set.insert(0);
            }
            set
        });

        Ok(Self {
            source: expr.trim().to_string(),
            seconds,
            minutes,
            hours,
            days,
            months,
            weekdays,
            timezone,
        })
    }

    /// The expression as originally supplied.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The line's timezone, if one was given.
    #[must_use]
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Whether `instant` matches every field of the line.
    #[must_use]
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let local = match self.timezone {
            Some(tz) => instant.with_timezone(&tz).naive_local(),
            None => instant.naive_utc(),
        };
        field_matches(&self.seconds, local.second())
            && field_matches(&self.minutes, local.minute())
            && field_matches(&self.hours, local.hour())
            && field_matches(&self.months, local.month())
            && self.day_matches(local.date())
    }

    /// The smallest instant strictly greater than `from` matching every
    /// field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCron` when no matching instant exists within the
    /// search horizon (an impossible date such as February 30th).
    pub fn next_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self.timezone {
            Some(tz) => self.next_in_zone(&tz, from),
            None => self.next_in_zone(&Utc, from),
        }
    }

    /// The smallest per-fire gap in seconds, measured over a short probe
    /// chain of upcoming fires. Used to validate a cron job's period against
    /// the scheduler tick.
    #[must_use]
    pub fn rough_frequency(&self) -> f64 {
        let mut current = match self.next_after(clock::now()) {
            Ok(t) => t,
            Err(_) => return f64::MAX,
        };
        let mut smallest = f64::MAX;
        for _ in 0..5 {
            let next = match self.next_after(current) {
                Ok(t) => t,
                Err(_) => break,
            };
            let gap = (next - current).num_milliseconds() as f64 / 1000.0;
            smallest = smallest.min(gap);
            current = next;
        }
        smallest
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days.as_ref().map(|set| set.contains(&date.day()));
        let dow = self
            .weekdays
            .as_ref()
            .map(|set| set.contains(&date.weekday().num_days_from_sunday()));
        // Classic cron: with both fields restricted, either may match.
        match (dom, dow) {
            (None, None) => true,
            (Some(d), None) => d,
            (None, Some(w)) => w,
            (Some(d), Some(w)) => d || w,
        }
    }

    /// Field-wise carry search over the line's local time, resolved back to
    /// UTC through `zone`. Nonexistent local times (DST gaps) are skipped;
    /// ambiguous ones resolve to the earliest mapping.
    fn next_in_zone<Z: TimeZone>(&self, zone: &Z, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let start = from.with_timezone(zone).naive_local();
        let mut cand = start.with_nanosecond(0).unwrap_or(start) + Duration::seconds(1);
        let horizon = start.date() + Duration::days(HORIZON_DAYS);

        for _ in 0..MAX_SEARCH_STEPS {
            if cand.date() > horizon {
                break;
            }

            if let Some(months) = &self.months {
                if !months.contains(&cand.month()) {
                    cand = midnight(first_of_next_month(cand.date()).ok_or_else(|| self.give_up())?);
                    continue;
                }
            }

            if !self.day_matches(cand.date()) {
                cand = midnight(cand.date().succ_opt().ok_or_else(|| self.give_up())?);
                continue;
            }

            if let Some(hours) = &self.hours {
                if !hours.contains(&cand.hour()) {
                    cand = match next_member(hours, cand.hour()) {
                        Some(hour) => at_hms(cand.date(), hour, 0, 0),
                        None => midnight(cand.date().succ_opt().ok_or_else(|| self.give_up())?),
                    };
                    continue;
                }
            }

            if let Some(minutes) = &self.minutes {
                if !minutes.contains(&cand.minute()) {
                    cand = match next_member(minutes, cand.minute()) {
                        Some(minute) => at_hms(cand.date(), cand.hour(), minute, 0),
                        None => at_hms(cand.date(), cand.hour(), 0, 0) + Duration::hours(1),
                    };
                    continue;
                }
            }

            if let Some(seconds) = &self.seconds {
                if !seconds.contains(&cand.second()) {
                    cand = match next_member(seconds, cand.second()) {
                        Some(second) => at_hms(cand.date(), cand.hour(), cand.minute(), second),
                        None => {
                            at_hms(cand.date(), cand.hour(), cand.minute(), 0) + Duration::minutes(1)
                        }
                    };
                    continue;
                }
            }

            match zone.from_local_datetime(&cand) {
                LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earliest, _) => return Ok(earliest.with_timezone(&Utc)),
                LocalResult::None => {
                    cand += Duration::seconds(1);
                    continue;
                }
            }
        }

        Err(self.give_up())
    }

    fn give_up(&self) -> Error {
        Error::InvalidCron {
            expr: self.source.clone(),
            reason: "no matching time within four years".into(),
        }
    }
}

impl FromStr for CronLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(expr: &str, reason: impl Into<String>) -> Error {
    Error::InvalidCron {
        expr: expr.into(),
        reason: reason.into(),
    }
}

fn field_matches(field: &Option<BTreeSet<u32>>, value: u32) -> bool {
    field.as_ref().is_none_or(|set| set.contains(&value))
}

/// Smallest set member strictly greater than `value`.
fn next_member(set: &BTreeSet<u32>, value: u32) -> Option<u32> {
    set.range(value + 1..).next().copied()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn at_hms(date: NaiveDate, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, second).unwrap_or_default()
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Parse one cron field into a matched-value set, `None` for `*`.
fn parse_field(
    expr: &str,
    token: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> Result<Option<BTreeSet<u32>>> {
    if token == "*" {
        return Ok(None);
    }

    let mut set = BTreeSet::new();
    for part in token.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((range, step_text)) => {
                let step: u32 = step_text
                    .parse()
                    .map_err(|_| invalid(expr, format!("bad step in {part:?}")))?;
                if step == 0 {
                    return Err(invalid(expr, format!("zero step in {part:?}")));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            (
                parse_field_value(expr, a, min, max, names)?,
                parse_field_value(expr, b, min, max, names)?,
            )
        } else {
            let value = parse_field_value(expr, range_part, min, max, names)?;
            // "a/k" counts from a to the field maximum.
            if step > 1 {
                (value, max)
            } else {
                (value, value)
            }
        };

        if lo > hi {
            return Err(invalid(expr, format!("inverted range in {part:?}")));
        }
        for value in (lo..=hi).step_by(step as usize) {
            set.insert(value);
        }
    }

    if set.is_empty() {
        return Err(invalid(expr, format!("empty field {token:?}")));
    }
    Ok(Some(set))
}

fn parse_field_value(
    expr: &str,
    text: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> Result<u32> {
    if let Some(names) = names {
        let lowered = text.to_ascii_lowercase();
        if let Some(index) = names.iter().position(|n| *n == lowered) {
            // Name tables count from the field minimum: months from 1,
            // weekdays from 0.
            return Ok(index as u32 + min);
        }
    }
    let value: u32 = text
        .parse()
        .map_err(|_| invalid(expr, format!("bad value {text:?}")))?;
    if value < min || value > max {
        return Err(invalid(
            expr,
            format!("value {value} out of range {min}..={max}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn five_fields_fire_at_second_zero() {
        let line = CronLine::parse("*/5 * * * *").unwrap();
        assert_eq!(line.seconds, Some(BTreeSet::from([0])));
        assert_eq!(
            line.minutes,
            Some(BTreeSet::from([0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55]))
        );
    }

    #[test]
    fn six_fields_select_seconds() {
        let line = CronLine::parse("30 * * * * *").unwrap();
        assert_eq!(line.seconds, Some(BTreeSet::from([30])));
        assert_eq!(line.minutes, None);
    }

    #[test]
    fn names_and_ranges() {
        let line = CronLine::parse("0 9 * Jan-Mar Mon-Fri").unwrap();
        assert_eq!(line.months, Some(BTreeSet::from([1, 2, 3])));
        assert_eq!(line.weekdays, Some(BTreeSet::from([1, 2, 3, 4, 5])));
    }

    #[test]
    fn weekday_seven_is_sunday() {
        let line = CronLine::parse("0 0 * * 7").unwrap();
        assert_eq!(line.weekdays, Some(BTreeSet::from([0])));
    }

    #[test]
    fn trailing_timezone_token() {
        let line = CronLine::parse("0 9 * * * Europe/Berlin").unwrap();
        assert_eq!(line.timezone, Some(chrono_tz::Europe::Berlin));
        assert_eq!(line.minutes, Some(BTreeSet::from([0])));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(CronLine::parse("* * *").is_err());
        assert!(CronLine::parse("61 * * * *").is_err());
        assert!(CronLine::parse("* * 32 * *").is_err());
        assert!(CronLine::parse("*/0 * * * *").is_err());
        assert!(CronLine::parse("5-1 * * * *").is_err());
        assert!(CronLine::parse("* * * Foo *").is_err());
    }

    #[test]
    fn every_five_minutes_progression() {
        let line = CronLine::parse("*/5 * * * *").unwrap();
        let t0 = utc(2030, 1, 10, 12, 2, 0);
        let t1 = line.next_after(t0).unwrap();
        assert_eq!(t1, utc(2030, 1, 10, 12, 5, 0));
        let t2 = line.next_after(t1).unwrap();
        assert_eq!(t2, utc(2030, 1, 10, 12, 10, 0));
        let t3 = line.next_after(t2).unwrap();
        assert_eq!(t3, utc(2030, 1, 10, 12, 15, 0));
    }

    #[test]
    fn next_is_strictly_greater() {
        let line = CronLine::parse("0 12 * * *").unwrap();
        let exactly_noon = utc(2030, 1, 10, 12, 0, 0);
        assert_eq!(
            line.next_after(exactly_noon).unwrap(),
            utc(2030, 1, 11, 12, 0, 0)
        );
    }

    #[test]
    fn day_and_month_carry() {
        let line = CronLine::parse("30 8 1 * *").unwrap();
        let from = utc(2030, 1, 31, 9, 0, 0);
        assert_eq!(line.next_after(from).unwrap(), utc(2030, 2, 1, 8, 30, 0));

        let line = CronLine::parse("0 0 29 2 *").unwrap();
        let from = utc(2030, 1, 1, 0, 0, 0);
        // Next leap day after 2030.
        assert_eq!(line.next_after(from).unwrap(), utc(2032, 2, 29, 0, 0, 0));
    }

    #[test]
    fn weekday_restriction() {
        let line = CronLine::parse("0 9 * * 1").unwrap();
        // 2030-01-10 is a Thursday; the following Monday is the 14th.
        let from = utc(2030, 1, 10, 12, 0, 0);
        assert_eq!(line.next_after(from).unwrap(), utc(2030, 1, 14, 9, 0, 0));
    }

    #[test]
    fn dom_and_dow_match_either() {
        // The 15th or a Monday, whichever comes first.
        let line = CronLine::parse("0 0 15 * 1").unwrap();
        let from = utc(2030, 1, 10, 0, 0, 0);
        // 2030-01-14 is a Monday, before the 15th.
        assert_eq!(line.next_after(from).unwrap(), utc(2030, 1, 14, 0, 0, 0));
    }

    #[test]
    fn six_field_second_resolution() {
        let line = CronLine::parse("*/15 * * * * *").unwrap();
        let from = utc(2030, 1, 10, 12, 0, 7);
        assert_eq!(line.next_after(from).unwrap(), utc(2030, 1, 10, 12, 0, 15));
    }

    #[test]
    fn impossible_date_fails() {
        let line = CronLine::parse("0 0 30 2 *").unwrap();
        let err = line.next_after(utc(2030, 1, 1, 0, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidCron { .. }));
    }

    #[test]
    fn timezone_shifts_fire_time() {
        let line = CronLine::parse("0 9 * * * Europe/Berlin").unwrap();
        let from = utc(2030, 1, 10, 0, 0, 0);
        // 09:00 Berlin winter time is 08:00 UTC.
        assert_eq!(line.next_after(from).unwrap(), utc(2030, 1, 10, 8, 0, 0));
    }

    #[test]
    fn matches_checks_all_fields() {
        let line = CronLine::parse("*/5 * * * *").unwrap();
        assert!(line.matches(utc(2030, 1, 10, 12, 5, 0)));
        assert!(!line.matches(utc(2030, 1, 10, 12, 5, 1)));
        assert!(!line.matches(utc(2030, 1, 10, 12, 2, 0)));
    }

    #[test]
    fn rough_frequency_probes_fire_gaps() {
        assert_eq!(CronLine::parse("* * * * *").unwrap().rough_frequency(), 60.0);
        assert_eq!(
            CronLine::parse("* * * * * *").unwrap().rough_frequency(),
            1.0
        );
    }
}
