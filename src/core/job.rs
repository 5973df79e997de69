//! The job model: variants, options, and the lifecycle state machine.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Weak;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::callable::{Callable, JobRun};
use crate::core::error::{AppResult, Error, Result};
use crate::core::hooks::JobEventKind;
use crate::core::scheduler::SchedulerCore;
use crate::core::worker::InterruptReason;
use crate::time::cron::CronLine;
use crate::time::duration::{secs_to_chrono, SpanSpec};
use crate::time::point::PointSpec;
use crate::util::clock;

/// Opaque job identifier, unique per scheduler instance.
pub type JobId = String;

/// The four job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Fires once at an absolute instant.
    At,
    /// Fires once after a delay from creation.
    In,
    /// Fires repeatedly at a fixed interval.
    Every,
    /// Fires on a cron schedule.
    Cron,
}

impl JobKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            JobKind::At => "at",
            JobKind::In => "in",
            JobKind::Every => "every",
            JobKind::Cron => "cron",
        }
    }
}

/// The temporal behaviour bound to a job. `In` delays are resolved to an
/// absolute instant at creation.
#[derive(Debug, Clone)]
pub(crate) enum Timing {
    At { at: DateTime<Utc> },
    In { at: DateTime<Utc> },
    Every { period: f64 },
    Cron { line: CronLine },
}

impl Timing {
    pub(crate) fn kind(&self) -> JobKind {
        match self {
            Timing::At { .. } => JobKind::At,
            Timing::In { .. } => JobKind::In,
            Timing::Every { .. } => JobKind::Every,
            Timing::Cron { .. } => JobKind::Cron,
        }
    }
}

/// Lifecycle state of a job.
///
/// `Scheduled` covers both waiting and firing; whether an execution is in
/// flight right now is [`Job::is_running`]. Periodic jobs return to
/// `Scheduled` after each fire until exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// In the scheduler, waiting for (or between) fires.
    Scheduled,
    /// Finished: a one-shot that fired, or a periodic job that exhausted
    /// its limits.
    Done,
    /// Marked for removal by `unschedule`.
    Unscheduled,
    /// The last execution was forcibly interrupted.
    Killed,
    /// The last execution was interrupted by the timeout supervisor.
    TimedOut,
}

/// Timeout option before resolution.
#[derive(Debug, Clone)]
enum TimeoutOpt {
    After(SpanSpec),
    At(PointSpec),
}

/// First/last boundary option before resolution.
#[derive(Debug, Clone)]
enum EdgeOpt {
    At(PointSpec),
    In(SpanSpec),
}

/// Resolved timeout: absolute, or relative to each fire.
#[derive(Debug, Clone)]
pub(crate) enum TimeoutSpec {
    After(f64),
    At(DateTime<Utc>),
}

/// Recognised scheduling options.
///
/// ```rust
/// use chime::JobOpts;
///
/// let opts = JobOpts::new()
///     .with_tag("reports")
///     .with_mutex("db")
///     .with_times(3)
///     .with_timeout("30s");
/// ```
#[derive(Debug, Clone)]
pub struct JobOpts {
    tags: BTreeSet<String>,
    mutexes: Vec<String>,
    blocking: bool,
    timeout: Option<TimeoutOpt>,
    first: Option<EdgeOpt>,
    last: Option<EdgeOpt>,
    times: Option<u64>,
    discard_past: bool,
    timeout_reschedule: bool,
}

impl Default for JobOpts {
    fn default() -> Self {
        Self {
            tags: BTreeSet::new(),
            mutexes: Vec::new(),
            blocking: false,
            timeout: None,
            first: None,
            last: None,
            times: None,
            discard_past: false,
            timeout_reschedule: true,
        }
    }
}

impl JobOpts {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Serialise execution with every job naming the same mutex.
    #[must_use]
    pub fn with_mutex(mut self, name: impl Into<String>) -> Self {
        self.mutexes.push(name.into());
        self
    }

    /// Name several mutexes; all are held for the duration of the callable.
    #[must_use]
    pub fn with_mutexes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutexes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Run the callable on the scheduler thread itself, blocking the tick
    /// loop until it returns.
    #[must_use]
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Interrupt each execution running longer than this.
    #[must_use]
    pub fn with_timeout(mut self, span: impl Into<SpanSpec>) -> Self {
        self.timeout = Some(TimeoutOpt::After(span.into()));
        self
    }

    /// Interrupt any execution still running at this absolute instant.
    #[must_use]
    pub fn with_timeout_at(mut self, point: impl Into<PointSpec>) -> Self {
        self.timeout = Some(TimeoutOpt::At(point.into()));
        self
    }

    /// Earliest instant at which a periodic job may first fire.
    #[must_use]
    pub fn with_first_at(mut self, point: impl Into<PointSpec>) -> Self {
        self.first = Some(EdgeOpt::At(point.into()));
        self
    }

    /// Earliest first fire, as a delay from scheduling.
    #[must_use]
    pub fn with_first_in(mut self, span: impl Into<SpanSpec>) -> Self {
        self.first = Some(EdgeOpt::In(span.into()));
        self
    }

    /// No fires after this instant.
    #[must_use]
    pub fn with_last_at(mut self, point: impl Into<PointSpec>) -> Self {
        self.last = Some(EdgeOpt::At(point.into()));
        self
    }

    /// No fires after this delay from scheduling.
    #[must_use]
    pub fn with_last_in(mut self, span: impl Into<SpanSpec>) -> Self {
        self.last = Some(EdgeOpt::In(span.into()));
        self
    }

    /// Maximum number of firings for a periodic job.
    #[must_use]
    pub fn with_times(mut self, times: u64) -> Self {
        self.times = Some(times);
        self
    }

    /// Skip fires that should already have happened instead of executing
    /// them immediately.
    #[must_use]
    pub fn with_discard_past(mut self, discard_past: bool) -> Self {
        self.discard_past = discard_past;
        self
    }

    /// Whether a periodic job keeps its schedule after an execution timed
    /// out. Defaults to true.
    #[must_use]
    pub fn with_timeout_reschedule(mut self, reschedule: bool) -> Self {
        self.timeout_reschedule = reschedule;
        self
    }

    /// Resolve spec strings against `now` into absolute values.
    pub(crate) fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedOpts> {
        let timeout = match &self.timeout {
            None => None,
            Some(TimeoutOpt::After(span)) => {
                let secs = span.resolve()?;
                if secs < 0.0 {
                    return Err(Error::InvalidArgument(
                        "timeout must not be negative".into(),
                    ));
                }
                Some(TimeoutSpec::After(secs))
            }
            Some(TimeoutOpt::At(point)) => Some(TimeoutSpec::At(point.resolve()?)),
        };

        let resolve_edge = |edge: &Option<EdgeOpt>| -> Result<Option<DateTime<Utc>>> {
            match edge {
                None => Ok(None),
                Some(EdgeOpt::At(point)) => point.resolve().map(Some),
                Some(EdgeOpt::In(span)) => {
                    Ok(Some(now + secs_to_chrono(span.resolve()?)))
                }
            }
        };

        let mut mutexes = self.mutexes.clone();
        // Deadlock avoidance: multi-mutex jobs always acquire in name order.
        mutexes.sort();
        mutexes.dedup();

        Ok(ResolvedOpts {
            tags: self.tags.clone(),
            mutexes,
            blocking: self.blocking,
            timeout,
            first_at: resolve_edge(&self.first)?,
            last_at: resolve_edge(&self.last)?,
            times: self.times,
            discard_past: self.discard_past,
            timeout_reschedule: self.timeout_reschedule,
        })
    }
}

/// Options after spec resolution, as carried by a scheduled job.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOpts {
    pub(crate) tags: BTreeSet<String>,
    pub(crate) mutexes: Vec<String>,
    pub(crate) blocking: bool,
    pub(crate) timeout: Option<TimeoutSpec>,
    pub(crate) first_at: Option<DateTime<Utc>>,
    pub(crate) last_at: Option<DateTime<Utc>>,
    pub(crate) times: Option<u64>,
    pub(crate) discard_past: bool,
    pub(crate) timeout_reschedule: bool,
}

/// Interior-mutable lifecycle state.
struct JobState {
    next_time: DateTime<Utc>,
    last_time: Option<DateTime<Utc>>,
    unscheduled_at: Option<DateTime<Utc>>,
    status: JobStatus,
}

/// What the tick loop should do with a due job.
pub(crate) enum FireDecision {
    /// Run the callable.
    Fire,
    /// Paused periodic job: skip the callable, keep the schedule.
    SkipPaused,
    /// Limits exhausted; drop without firing.
    DropExhausted,
    /// Already marked unscheduled; drop quietly.
    DropUnscheduled,
}

/// A scheduled job.
///
/// Jobs are shared (`Arc`) between the scheduler's store, in-flight worker
/// threads, and any handles the embedder keeps. All mutable state is
/// interior and thread-safe. A job holds a non-owning reference back to its
/// scheduler; the scheduler outlives every job it owns.
pub struct Job {
    id: JobId,
    timing: Timing,
    original_spec: String,
    callable: Callable,
    opts: ResolvedOpts,
    scheduled_at: DateTime<Utc>,
    core: Weak<SchedulerCore>,
    state: Mutex<JobState>,
    paused: AtomicBool,
    count: AtomicU64,
    running: AtomicU32,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        timing: Timing,
        original_spec: String,
        callable: Callable,
        opts: ResolvedOpts,
        core: Weak<SchedulerCore>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let natural = match &timing {
            Timing::At { at } | Timing::In { at } => *at,
            Timing::Every { period } => now + secs_to_chrono(*period),
            Timing::Cron { line } => line.next_after(now)?,
        };

        let mut first_time = opts.first_at.unwrap_or(natural);
        if opts.discard_past && first_time <= now {
            first_time = match &timing {
                Timing::Every { period } => {
                    let step = secs_to_chrono(*period);
                    let mut t = first_time;
                    while t <= now {
                        t += step;
                    }
                    t
                }
                Timing::Cron { line } => line.next_after(now)?,
                Timing::At { .. } | Timing::In { .. } => first_time,
            };
        }

        Ok(Self {
            id,
            timing,
            original_spec,
            callable,
            opts,
            scheduled_at: now,
            core,
            state: Mutex::new(JobState {
                next_time: first_time,
                last_time: None,
                unscheduled_at: None,
                status: JobStatus::Scheduled,
            }),
            paused: AtomicBool::new(false),
            count: AtomicU64::new(0),
            running: AtomicU32::new(0),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────

    /// The job's id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The job's variant.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.timing.kind()
    }

    /// The temporal spec as originally supplied, for diagnostics.
    #[must_use]
    pub fn original_spec(&self) -> &str {
        &self.original_spec
    }

    /// Tags carried by the job.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.opts.tags.iter().cloned().collect()
    }

    /// Whether the job carries every tag in `required`.
    #[must_use]
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.opts.tags.contains(tag))
    }

    /// Creation instant.
    #[must_use]
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// The next instant at which the scheduler considers this job due.
    #[must_use]
    pub fn next_time(&self) -> DateTime<Utc> {
        self.state.lock().next_time
    }

    /// The most recent fire instant, if any.
    #[must_use]
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_time
    }

    /// When the job was marked for removal, if it has been.
    #[must_use]
    pub fn unscheduled_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unscheduled_at
    }

    /// Lifecycle state.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Number of completed firings.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether any execution of this job is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) > 0
    }

    /// Whether the job is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whether the job reschedules after firing.
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        matches!(self.timing, Timing::Every { .. } | Timing::Cron { .. })
    }

    pub(crate) fn is_blocking(&self) -> bool {
        self.opts.blocking
    }

    pub(crate) fn mutex_names(&self) -> &[String] {
        &self.opts.mutexes
    }

    pub(crate) fn timeout_reschedule(&self) -> bool {
        self.opts.timeout_reschedule
    }

    // ── Public control ────────────────────────────────────────────────

    /// Pause a periodic job: it stays scheduled and keeps advancing its
    /// `next_time`, but its trigger becomes a no-op until resumed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for one-shot jobs.
    pub fn pause(&self) -> Result<()> {
        if !self.is_periodic() {
            return Err(Error::InvalidArgument(format!(
                "cannot pause one-shot job {}",
                self.id
            )));
        }
        self.paused.store(true, Ordering::Release);
        self.emit(JobEventKind::Paused);
        Ok(())
    }

    /// Resume a paused periodic job.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for one-shot jobs.
    pub fn resume(&self) -> Result<()> {
        if !self.is_periodic() {
            return Err(Error::InvalidArgument(format!(
                "cannot resume one-shot job {}",
                self.id
            )));
        }
        self.paused.store(false, Ordering::Release);
        self.emit(JobEventKind::Resumed);
        Ok(())
    }

    /// Mark the job for removal. Actual removal happens on the next sweep;
    /// an execution already in flight is not interrupted.
    pub fn unschedule(&self) {
        let mut state = self.state.lock();
        if state.unscheduled_at.is_none() {
            state.unscheduled_at = Some(clock::now());
        }
        if state.status == JobStatus::Scheduled {
            state.status = JobStatus::Unscheduled;
        }
    }

    /// Forcibly interrupt every in-flight execution of this job.
    pub fn kill(&self) {
        if let Some(core) = self.core.upgrade() {
            core.interrupt_job(&self.id, InterruptReason::Kill);
        }
    }

    // ── Crate-internal lifecycle ──────────────────────────────────────

    pub(crate) fn fire_decision(&self) -> FireDecision {
        // `unscheduled_at` is the authoritative removal marker; status may
        // be TimedOut/Killed from an earlier run of a still-live job.
        if self.state.lock().unscheduled_at.is_some() {
            return FireDecision::DropUnscheduled;
        }
        let fire_time = self.next_time();
        if let Some(times) = self.opts.times {
            if self.count() >= times {
                return FireDecision::DropExhausted;
            }
        }
        if let Some(last_at) = self.opts.last_at {
            if fire_time > last_at {
                return FireDecision::DropExhausted;
            }
        }
        if self.is_periodic() && self.is_paused() {
            return FireDecision::SkipPaused;
        }
        FireDecision::Fire
    }

    pub(crate) fn note_fire(&self, now: DateTime<Utc>) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.last_time = Some(now);
        // A fresh fire clears a TimedOut/Killed verdict from an earlier run.
        state.status = JobStatus::Scheduled;
    }

    pub(crate) fn note_run_started(&self) {
        self.running.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn note_run_finished(&self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }

    /// Compute and store the next fire after acting at `now`. Returns true
    /// when the job should be re-inserted into the store.
    pub(crate) fn advance(&self, now: DateTime<Utc>) -> bool {
        let next = match &self.timing {
            Timing::Every { period } => now + secs_to_chrono(*period),
            Timing::Cron { line } => match line.next_after(now) {
                Ok(next) => next,
                Err(error) => {
                    tracing::error!(job_id = %self.id, %error, "cron line stopped producing fire times");
                    self.mark_done(now);
                    return false;
                }
            },
            Timing::At { .. } | Timing::In { .. } => return false,
        };

        if let Some(last_at) = self.opts.last_at {
            if next > last_at {
                self.mark_done(now);
                return false;
            }
        }
        if let Some(times) = self.opts.times {
            if self.count() >= times {
                self.mark_done(now);
                return false;
            }
        }

        let mut state = self.state.lock();
        if state.unscheduled_at.is_some() {
            return false;
        }
        state.next_time = next;
        true
    }

    /// Terminal transition for a job leaving the scheduler of its own
    /// accord (one-shot fired, limits exhausted).
    pub(crate) fn mark_done(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        if state.unscheduled_at.is_none() {
            state.unscheduled_at = Some(now);
        }
        if state.status == JobStatus::Scheduled {
            state.status = JobStatus::Done;
        }
    }

    /// Record an interrupted execution.
    pub(crate) fn record_interrupt(&self, status: JobStatus) {
        self.state.lock().status = status;
    }

    pub(crate) fn timeout_deadline(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.opts.timeout {
            None => None,
            Some(TimeoutSpec::At(at)) => Some(*at),
            Some(TimeoutSpec::After(secs)) => Some(started_at + secs_to_chrono(*secs)),
        }
    }

    pub(crate) fn invoke(&self, run: &JobRun) -> AppResult<()> {
        (self.callable)(run)
    }

    fn emit(&self, kind: JobEventKind) {
        if let Some(core) = self.core.upgrade() {
            core.emit(kind, self);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("original_spec", &self.original_spec)
            .field("next_time", &self.next_time())
            .field("status", &self.status())
            .field("count", &self.count())
            .finish()
    }
}
