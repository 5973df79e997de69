//! Wall-clock access.
//!
//! Every scheduling decision (due extraction, reschedule arithmetic,
//! timeout deadlines, uptime) reads the clock through [`now`], keeping the
//! crate's notion of "now" in one place.

use chrono::{DateTime, Utc};

/// The current instant, in UTC.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
