//! Temporal specification grammars: duration strings, absolute time strings,
//! and cron expressions.

pub mod cron;
pub mod duration;
pub mod point;

pub use cron::CronLine;
pub use duration::{format_duration, parse_duration, parse_duration_opt, SpanSpec};
pub use point::{parse_time_point, PointSpec};
