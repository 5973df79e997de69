//! # chime
//!
//! An in-process job scheduler: hand it closures with a temporal spec
//! (one-shot at an absolute time, one-shot after a delay, fixed-interval,
//! or cron) and it fires them at the prescribed moments, each firing on
//! its own worker thread.
//!
//! A dedicated loop thread wakes every tick (300 ms by default), removes
//! unscheduled jobs, triggers the due ones, and interrupts executions that
//! outlived their timeout. Jobs can be tagged, enumerated, paused, resumed,
//! timed out, and cancelled while the scheduler runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chime::{JobOpts, Scheduler, ShutdownMode};
//!
//! let scheduler = Scheduler::start().unwrap();
//!
//! scheduler.in_("30s", || println!("thirty seconds later")).unwrap();
//! scheduler.every("1h", || println!("hourly")).unwrap();
//! scheduler
//!     .cron_with(
//!         "0 7 * * Mon-Fri Europe/Berlin",
//!         || println!("weekday mornings"),
//!         JobOpts::new().with_tag("reports").with_timeout("5m"),
//!     )
//!     .unwrap();
//!
//! std::thread::sleep(std::time::Duration::from_secs(3600));
//! scheduler.shutdown(ShutdownMode::Wait);
//! ```
//!
//! ## Temporal specs
//!
//! - Durations ([`time::duration`]): `"1h10s"`, `"250ms"`, `"-1h"`, or
//!   bare seconds (`"500"` is 500 s).
//! - Absolute times ([`time::point`]): `"2030-12-24 18:00:00 Europe/Berlin"`.
//! - Cron lines ([`time::cron`]): 5 or 6 fields plus an optional trailing
//!   timezone.
//!
//! Schedules are in-memory only; this crate does not persist them across
//! process restarts, coordinate across nodes, or promise sub-tick
//! precision.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod time;
pub mod util;

pub use config::SchedulerConfig;
pub use core::{
    AppResult, Callable, Error, EventSink, InMemoryEventSink, InterruptReason, IntoCallable, Job,
    JobEvent, JobEventKind, JobFilter, JobId, JobKind, JobOpts, JobRun, JobStatus, Result,
    Scheduler, ShutdownMode,
};
pub use time::{format_duration, parse_duration, parse_time_point, CronLine};
