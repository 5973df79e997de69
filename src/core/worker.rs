//! Running-worker registry and cooperative interruption.
//!
//! Every non-blocking firing runs on its own worker thread; the registry
//! maps worker identities to the job, start timestamp, timeout deadline,
//! and interrupt token of the execution. Entries are inserted on worker
//! entry and removed on every exit path.
//!
//! Threads cannot be interrupted from outside, so interruption is a
//! cooperative token: the supervisor (or a kill) flips the token and wakes
//! any [`sleep`](InterruptToken::sleep) in progress; callables observe the
//! token through their [`JobRun`](crate::JobRun) context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::core::error::{Error, Result};
use crate::core::job::Job;

/// Why a running execution was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// The execution exceeded its timeout.
    Timeout,
    /// The execution was forcibly stopped (`shutdown(Kill)` or `Job::kill`).
    Kill,
}

impl From<InterruptReason> for Error {
    fn from(reason: InterruptReason) -> Self {
        match reason {
            InterruptReason::Timeout => Error::Timeout,
            InterruptReason::Kill => Error::Killed,
        }
    }
}

/// One-shot interruption flag with a condvar so interruptible sleeps wake
/// immediately. The first reason wins; later interrupts are ignored.
pub(crate) struct InterruptToken {
    state: Mutex<Option<InterruptReason>>,
    signal: Condvar,
}

impl InterruptToken {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(None),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn interrupt(&self, reason: InterruptReason) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(reason);
        }
        self.signal.notify_all();
    }

    pub(crate) fn reason(&self) -> Option<InterruptReason> {
        *self.state.lock()
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }

    pub(crate) fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        loop {
            if let Some(reason) = *state {
                return Err(reason.into());
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            self.signal.wait_for(&mut state, deadline - now);
        }
    }
}

/// A registered in-flight execution.
#[derive(Clone)]
pub(crate) struct RunningWorker {
    pub(crate) job: Arc<Job>,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) deadline: Option<DateTime<Utc>>,
    pub(crate) token: Arc<InterruptToken>,
}

/// Map from worker identity to its execution record.
pub(crate) struct WorkerRegistry {
    entries: Mutex<HashMap<u64, RunningWorker>>,
    seq: AtomicU64,
}

impl WorkerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(
        &self,
        job: Arc<Job>,
        started_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        token: Arc<InterruptToken>,
    ) -> u64 {
        let worker_id = self.seq.fetch_add(1, Ordering::Relaxed);
        job.note_run_started();
        self.entries.lock().insert(
            worker_id,
            RunningWorker {
                job,
                started_at,
                deadline,
                token,
            },
        );
        worker_id
    }

    pub(crate) fn deregister(&self, worker_id: u64) {
        if let Some(entry) = self.entries.lock().remove(&worker_id) {
            entry.job.note_run_finished();
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<RunningWorker> {
        self.entries.lock().values().cloned().collect()
    }

    /// Distinct jobs with at least one in-flight execution.
    pub(crate) fn running_jobs(&self) -> Vec<Arc<Job>> {
        let entries = self.entries.lock();
        let mut jobs: Vec<Arc<Job>> = Vec::new();
        for entry in entries.values() {
            if !jobs.iter().any(|j| j.id() == entry.job.id()) {
                jobs.push(entry.job.clone());
            }
        }
        jobs
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub(crate) fn interrupt_all(&self, reason: InterruptReason) {
        for entry in self.entries.lock().values() {
            entry.token.interrupt(reason);
        }
    }

    pub(crate) fn interrupt_job(&self, job_id: &str, reason: InterruptReason) {
        for entry in self.entries.lock().values() {
            if entry.job.id() == job_id {
                entry.token.interrupt(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn first_interrupt_reason_wins() {
        let token = InterruptToken::new();
        token.interrupt(InterruptReason::Timeout);
        token.interrupt(InterruptReason::Kill);
        assert_eq!(token.reason(), Some(InterruptReason::Timeout));
        assert!(matches!(token.check(), Err(Error::Timeout)));
    }

    #[test]
    fn sleep_completes_when_uninterrupted() {
        let token = InterruptToken::new();
        let start = Instant::now();
        token.sleep(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleep_wakes_early_on_interrupt() {
        let token = Arc::new(InterruptToken::new());
        let interrupter = Arc::clone(&token);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            interrupter.interrupt(InterruptReason::Kill);
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(5));
        handle.join().unwrap();

        assert!(matches!(result, Err(Error::Killed)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
