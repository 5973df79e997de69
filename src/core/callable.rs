//! Job payloads and the run context handed to them.
//!
//! A scheduled callable is any `Fn` closure convertible through
//! [`IntoCallable`]: it may take nothing or a [`JobRun`] context, and may
//! return nothing or an [`AppResult`]. The context carries the job handle,
//! the scheduled fire time, the wall-clock trigger time, and the
//! cooperative-interruption helpers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::error::{AppResult, Result};
use crate::core::job::Job;
use crate::core::worker::{InterruptReason, InterruptToken};

/// The canonical boxed form every scheduled callable is lowered to.
pub type Callable = Box<dyn Fn(&JobRun) -> AppResult<()> + Send + Sync + 'static>;

/// Context for one firing of a job.
pub struct JobRun {
    job: Arc<Job>,
    scheduled_time: DateTime<Utc>,
    fired_at: DateTime<Utc>,
    token: Arc<InterruptToken>,
}

impl JobRun {
    pub(crate) fn new(
        job: Arc<Job>,
        scheduled_time: DateTime<Utc>,
        fired_at: DateTime<Utc>,
        token: Arc<InterruptToken>,
    ) -> Self {
        Self {
            job,
            scheduled_time,
            fired_at,
            token,
        }
    }

    /// The job this firing belongs to.
    #[must_use]
    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// The `next_time` value that selected this fire.
    #[must_use]
    pub fn scheduled_time(&self) -> DateTime<Utc> {
        self.scheduled_time
    }

    /// Wall-clock time at trigger entry.
    #[must_use]
    pub fn fired_at(&self) -> DateTime<Utc> {
        self.fired_at
    }

    /// Whether this execution has been interrupted, and why.
    #[must_use]
    pub fn interrupted(&self) -> Option<InterruptReason> {
        self.token.reason()
    }

    /// Fail fast if this execution has been interrupted. Long-running
    /// callables should call this between units of work.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` or `Error::Killed` once the supervisor has
    /// interrupted this execution.
    pub fn check_interrupt(&self) -> Result<()> {
        self.token.check()
    }

    /// Sleep for `duration`, waking early with an error when this execution
    /// is interrupted.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` or `Error::Killed` on interruption.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.token.sleep(duration)
    }
}

impl std::fmt::Debug for JobRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRun")
            .field("job_id", &self.job.id())
            .field("scheduled_time", &self.scheduled_time)
            .field("fired_at", &self.fired_at)
            .finish()
    }
}

/// Marker for closures taking no arguments.
#[doc(hidden)]
pub struct NoArgs;
/// Marker for fallible closures taking no arguments.
#[doc(hidden)]
pub struct TryNoArgs;
/// Marker for closures taking a [`JobRun`].
#[doc(hidden)]
pub struct WithRun;
/// Marker for fallible closures taking a [`JobRun`].
#[doc(hidden)]
pub struct TryWithRun;

/// Conversion from the accepted closure shapes into [`Callable`].
///
/// The `Args` marker disambiguates the shapes so a scheduling call accepts
/// any of them without annotation:
///
/// ```rust,no_run
/// # use chime::Scheduler;
/// let scheduler = Scheduler::start().unwrap();
/// scheduler.every("10s", || println!("tick")).unwrap();
/// scheduler
///     .every("10s", |run: &chime::JobRun| {
///         println!("tick for {}", run.job().id());
///     })
///     .unwrap();
/// ```
pub trait IntoCallable<Args> {
    /// Lower `self` into the canonical boxed callable.
    fn into_callable(self) -> Callable;
}

impl<F> IntoCallable<NoArgs> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn into_callable(self) -> Callable {
        Box::new(move |_run| {
            self();
            Ok(())
        })
    }
}

impl<F> IntoCallable<TryNoArgs> for F
where
    F: Fn() -> AppResult<()> + Send + Sync + 'static,
{
    fn into_callable(self) -> Callable {
        Box::new(move |_run| self())
    }
}

impl<F> IntoCallable<WithRun> for F
where
    F: Fn(&JobRun) + Send + Sync + 'static,
{
    fn into_callable(self) -> Callable {
        Box::new(move |run| {
            self(run);
            Ok(())
        })
    }
}

impl<F> IntoCallable<TryWithRun> for F
where
    F: Fn(&JobRun) -> AppResult<()> + Send + Sync + 'static,
{
    fn into_callable(self) -> Callable {
        Box::new(move |run| self(run))
    }
}
