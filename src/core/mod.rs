//! Core scheduling: the job model, the time-ordered store, the tick loop,
//! and the hooks around them.

pub mod callable;
pub mod error;
pub mod hooks;
pub mod job;
pub(crate) mod job_array;
pub mod scheduler;
pub mod worker;

pub use callable::{Callable, IntoCallable, JobRun};
pub use error::{AppResult, Error, Result};
pub use hooks::{EventSink, InMemoryEventSink, JobEvent, JobEventKind};
pub use job::{Job, JobId, JobKind, JobOpts, JobStatus};
pub use scheduler::{JobFilter, Scheduler, ShutdownMode};
pub use worker::InterruptReason;
