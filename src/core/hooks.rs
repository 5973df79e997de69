//! Lifecycle event hooks and the error handler.
//!
//! The scheduler reports every job lifecycle transition to an optional
//! [`EventSink`] and every callable failure to the error handler. Defaults
//! are tracing-only; embedders install their own with
//! [`Scheduler::set_event_sink`](crate::Scheduler::set_event_sink) and
//! [`Scheduler::set_error_handler`](crate::Scheduler::set_error_handler).

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::job::{Job, JobId};

/// A job lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    /// The job entered the scheduler.
    Scheduled,
    /// A firing of the job started.
    Triggered,
    /// A firing returned without error.
    Completed,
    /// A firing returned an error (delivered to the error handler).
    Failed,
    /// A firing was interrupted by the timeout supervisor.
    TimedOut,
    /// A firing was forcibly interrupted.
    Killed,
    /// The job left the scheduler.
    Unscheduled,
    /// The job was paused.
    Paused,
    /// The job was resumed.
    Resumed,
}

/// One recorded lifecycle event.
#[derive(Debug, Clone)]
pub struct JobEvent {
    /// Id of the job the event belongs to.
    pub job_id: JobId,
    /// The transition that occurred.
    pub kind: JobEventKind,
    /// When it occurred.
    pub at: DateTime<Utc>,
}

/// Event sink abstraction.
pub trait EventSink: Send + Sync {
    /// Record a lifecycle event.
    fn record(&self, event: JobEvent);
}

/// In-memory event sink with a bounded buffer, for testing and dev.
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<JobEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink retaining at most `max_events` entries.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: JobEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Handler invoked with every callable failure.
pub(crate) type ErrorHandler = Arc<dyn Fn(&Job, &anyhow::Error) + Send + Sync>;

pub(crate) fn default_error_handler() -> ErrorHandler {
    Arc::new(|job, error| {
        tracing::error!(job_id = %job.id(), %error, "job callable failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: JobEventKind) -> JobEvent {
        JobEvent {
            job_id: "every-0".into(),
            kind,
            at: Utc::now(),
        }
    }

    #[test]
    fn sink_retains_bounded_history() {
        let sink = InMemoryEventSink::new(2);
        sink.record(event(JobEventKind::Scheduled));
        sink.record(event(JobEventKind::Triggered));
        sink.record(event(JobEventKind::Completed));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, JobEventKind::Triggered);
        assert_eq!(events[1].kind, JobEventKind::Completed);
    }
}
