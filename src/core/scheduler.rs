//! The scheduler: public scheduling API, the tick loop, named mutexes, and
//! the timeout supervisor.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::core::callable::{Callable, IntoCallable, JobRun};
use crate::core::error::{Error, Result};
use crate::core::hooks::{default_error_handler, ErrorHandler, EventSink, JobEvent, JobEventKind};
use crate::core::job::{FireDecision, Job, JobId, JobKind, JobOpts, JobStatus, Timing};
use crate::core::job_array::JobArray;
use crate::core::worker::{InterruptReason, InterruptToken, WorkerRegistry};
use crate::time::cron::CronLine;
use crate::time::duration::{format_duration, secs_to_chrono, SpanSpec};
use crate::time::point::PointSpec;
use crate::util::clock;

/// How a scheduler shutdown treats in-flight executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop the loop; in-flight executions keep running to completion.
    Stop,
    /// Stop the loop, then wait for every in-flight execution to finish.
    Wait,
    /// Stop the loop and interrupt every in-flight execution.
    Kill,
}

/// Filter for job enumeration.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Only jobs with an in-flight execution.
    pub running: bool,
    /// Tags a job must all carry.
    pub tags: Vec<String>,
}

/// Shared scheduler internals. Jobs hold a non-owning (`Weak`) reference
/// back here; the loop thread and the public handle share ownership.
pub(crate) struct SchedulerCore {
    config: SchedulerConfig,
    jobs: JobArray,
    mutexes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    workers: WorkerRegistry,
    job_seq: AtomicU64,
    started_at: Mutex<Option<DateTime<Utc>>>,
    paused: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    error_handler: RwLock<ErrorHandler>,
    event_sink: RwLock<Option<Arc<dyn EventSink>>>,
}

impl SchedulerCore {
    pub(crate) fn emit(&self, kind: JobEventKind, job: &Job) {
        if let Some(sink) = &*self.event_sink.read() {
            sink.record(JobEvent {
                job_id: job.id().clone(),
                kind,
                at: clock::now(),
            });
        }
    }

    pub(crate) fn interrupt_job(&self, job_id: &str, reason: InterruptReason) {
        self.workers.interrupt_job(job_id, reason);
    }

    /// Invoke the error handler outside the registry lock; the handler is
    /// user code and may block.
    fn handle_error(&self, job: &Job, err: &anyhow::Error) {
        let handler = Arc::clone(&self.error_handler.read());
        (*handler)(job, err);
    }

    /// Fetch (creating on first reference) the named mutexes. `names` is
    /// already sorted and deduplicated by option resolution.
    fn named_mutexes(&self, names: &[String]) -> Vec<Arc<Mutex<()>>> {
        if names.is_empty() {
            return Vec::new();
        }
        let mut registry = self.mutexes.lock();
        names
            .iter()
            .map(|name| {
                registry
                    .entry(name.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            })
            .collect()
    }
}

enum TimingInput {
    At(PointSpec),
    In(SpanSpec),
    Every(SpanSpec),
    Cron(String),
}

/// An in-process job scheduler.
///
/// One dedicated loop thread wakes every tick, removes unscheduled jobs,
/// triggers due jobs on fresh worker threads, and interrupts executions
/// whose timeout has elapsed. Handles are cheap to clone and share.
///
/// ```rust,no_run
/// use chime::{JobOpts, Scheduler, ShutdownMode};
///
/// let scheduler = Scheduler::start().unwrap();
/// scheduler.every("30s", || println!("still here")).unwrap();
/// scheduler
///     .cron("0 9 * * Mon-Fri", || println!("standup"))
///     .unwrap();
/// scheduler
///     .in_with("10m", || println!("once"), JobOpts::new().with_tag("reminder"))
///     .unwrap();
/// // ...
/// scheduler.shutdown(ShutdownMode::Wait);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Scheduler {
    /// Start a scheduler with default configuration.
    ///
    /// # Errors
    ///
    /// Propagates configuration validation and thread-spawn failures.
    pub fn start() -> Result<Self> {
        Self::with_config(SchedulerConfig::default())
    }

    /// Start a scheduler with the given configuration.
    ///
    /// # Errors
    ///
    /// Propagates configuration validation and thread-spawn failures.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let core = Arc::new(SchedulerCore {
            config,
            jobs: JobArray::new(),
            mutexes: Mutex::new(HashMap::new()),
            workers: WorkerRegistry::new(),
            job_seq: AtomicU64::new(0),
            started_at: Mutex::new(Some(clock::now())),
            paused: AtomicBool::new(false),
            wake_tx: Mutex::new(Some(wake_tx)),
            error_handler: RwLock::new(default_error_handler()),
            event_sink: RwLock::new(None),
        });

        let loop_core = Arc::clone(&core);
        let handle = thread::Builder::new()
            .name(format!("{}-tick", core.config.thread_name_prefix))
            .spawn(move || run_loop(&loop_core, &wake_rx))
            .map_err(|e| Error::InvalidArgument(format!("failed to spawn loop thread: {e}")))?;

        info!(
            frequency_ms = core.config.frequency_ms,
            "scheduler started"
        );
        Ok(Self {
            core,
            loop_handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    // ── Scheduling ────────────────────────────────────────────────────

    /// Schedule a one-shot job at an absolute instant. Returns the job id.
    ///
    /// # Errors
    ///
    /// `InvalidTimeString` for an unparseable spec; `InvalidArgument` when
    /// the scheduler is shut down.
    pub fn at<A>(
        &self,
        point: impl Into<PointSpec>,
        callable: impl IntoCallable<A>,
    ) -> Result<JobId> {
        self.schedule_at(point, callable, JobOpts::default())
            .map(|job| job.id().clone())
    }

    /// [`at`](Self::at) with options.
    pub fn at_with<A>(
        &self,
        point: impl Into<PointSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<JobId> {
        self.schedule_at(point, callable, opts).map(|job| job.id().clone())
    }

    /// [`at`](Self::at) returning the job handle instead of its id.
    pub fn schedule_at<A>(
        &self,
        point: impl Into<PointSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<Arc<Job>> {
        self.schedule(
            TimingInput::At(point.into()),
            callable.into_callable(),
            opts,
        )
    }

    /// Schedule a one-shot job after a delay. Returns the job id.
    ///
    /// # Errors
    ///
    /// `InvalidDuration` for an unparseable spec; `InvalidArgument` when the
    /// scheduler is shut down.
    pub fn in_<A>(
        &self,
        delay: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
    ) -> Result<JobId> {
        self.schedule_in(delay, callable, JobOpts::default())
            .map(|job| job.id().clone())
    }

    /// [`in_`](Self::in_) with options.
    pub fn in_with<A>(
        &self,
        delay: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<JobId> {
        self.schedule_in(delay, callable, opts).map(|job| job.id().clone())
    }

    /// [`in_`](Self::in_) returning the job handle instead of its id.
    pub fn schedule_in<A>(
        &self,
        delay: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<Arc<Job>> {
        self.schedule(TimingInput::In(delay.into()), callable.into_callable(), opts)
    }

    /// Schedule a periodic job with a fixed interval. Returns the job id.
    ///
    /// # Errors
    ///
    /// `InvalidDuration` for an unparseable spec; `InvalidArgument` for a
    /// non-positive period or one below the tick frequency.
    pub fn every<A>(
        &self,
        period: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
    ) -> Result<JobId> {
        self.schedule_every(period, callable, JobOpts::default())
            .map(|job| job.id().clone())
    }

    /// [`every`](Self::every) with options.
    pub fn every_with<A>(
        &self,
        period: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<JobId> {
        self.schedule_every(period, callable, opts).map(|job| job.id().clone())
    }

    /// [`every`](Self::every) returning the job handle instead of its id.
    pub fn schedule_every<A>(
        &self,
        period: impl Into<SpanSpec>,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<Arc<Job>> {
        self.schedule(
            TimingInput::Every(period.into()),
            callable.into_callable(),
            opts,
        )
    }

    /// Schedule a periodic job on a cron expression. Returns the job id.
    ///
    /// # Errors
    ///
    /// `InvalidCron` for an unparseable expression; `InvalidArgument` when
    /// the expression fires more often than the tick frequency.
    pub fn cron<A>(&self, expr: &str, callable: impl IntoCallable<A>) -> Result<JobId> {
        self.schedule_cron(expr, callable, JobOpts::default())
            .map(|job| job.id().clone())
    }

    /// [`cron`](Self::cron) with options.
    pub fn cron_with<A>(
        &self,
        expr: &str,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<JobId> {
        self.schedule_cron(expr, callable, opts).map(|job| job.id().clone())
    }

    /// [`cron`](Self::cron) returning the job handle instead of its id.
    pub fn schedule_cron<A>(
        &self,
        expr: &str,
        callable: impl IntoCallable<A>,
        opts: JobOpts,
    ) -> Result<Arc<Job>> {
        self.schedule(
            TimingInput::Cron(expr.to_string()),
            callable.into_callable(),
            opts,
        )
    }

    fn schedule(
        &self,
        input: TimingInput,
        callable: Callable,
        opts: JobOpts,
    ) -> Result<Arc<Job>> {
        if self.core.started_at.lock().is_none() {
            return Err(Error::InvalidArgument("scheduler is shut down".into()));
        }
        let now = clock::now();
        let tick_secs = self.core.config.frequency_secs();

        let (timing, original_spec) = match input {
            TimingInput::At(point) => {
                let spec = point.display_text();
                (Timing::At { at: point.resolve()? }, spec)
            }
            TimingInput::In(span) => {
                let spec = span.display_text();
                let delay = span.resolve()?;
                (
                    Timing::In {
                        at: now + secs_to_chrono(delay),
                    },
                    spec,
                )
            }
            TimingInput::Every(span) => {
                let spec = span.display_text();
                let period = span.resolve()?;
                if period <= 0.0 {
                    return Err(Error::InvalidArgument(format!(
                        "interval must be positive, got {spec:?}"
                    )));
                }
                if period < tick_secs {
                    return Err(Error::InvalidArgument(format!(
                        "interval {spec:?} is below the scheduler tick of {}",
                        format_duration(tick_secs)
                    )));
                }
                (Timing::Every { period }, spec)
            }
            TimingInput::Cron(expr) => {
                let line = CronLine::parse(&expr)?;
                if line.rough_frequency() < tick_secs {
                    return Err(Error::InvalidArgument(format!(
                        "cron line {expr:?} fires more often than the scheduler tick of {}",
                        format_duration(tick_secs)
                    )));
                }
                (Timing::Cron { line }, expr)
            }
        };

        let resolved = opts.resolve(now)?;
        let id = format!(
            "{}-{}",
            timing.kind().label(),
            self.core.job_seq.fetch_add(1, Ordering::Relaxed)
        );
        let job = Arc::new(Job::new(
            id,
            timing,
            original_spec,
            callable,
            resolved,
            Arc::downgrade(&self.core),
            now,
        )?);

        self.core.jobs.push(Arc::clone(&job));
        self.core.emit(JobEventKind::Scheduled, &job);
        debug!(job_id = %job.id(), next_time = %job.next_time(), "job scheduled");
        Ok(job)
    }

    // ── Job management ────────────────────────────────────────────────

    /// Mark a job unscheduled; actual removal happens on the next sweep.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn unschedule(&self, job_id: &str) -> Result<()> {
        let job = self
            .job(job_id)
            .ok_or_else(|| Error::NotFound(job_id.to_string()))?;
        job.unschedule();
        Ok(())
    }

    /// Look up a job by id, or `None`.
    #[must_use]
    pub fn job(&self, job_id: &str) -> Option<Arc<Job>> {
        self.core.jobs.lookup(job_id).or_else(|| {
            self.core
                .workers
                .running_jobs()
                .into_iter()
                .find(|job| job.id() == job_id)
        })
    }

    /// All known jobs: scheduled ones plus any one-shot still executing.
    #[must_use]
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        let mut jobs = self.core.jobs.to_vec();
        for running in self.core.workers.running_jobs() {
            if !jobs.iter().any(|job| job.id() == running.id()) {
                jobs.push(running);
            }
        }
        jobs
    }

    /// Jobs matching a filter: `running` restricts to in-flight jobs, and a
    /// job must carry every requested tag.
    #[must_use]
    pub fn jobs_matching(&self, filter: &JobFilter) -> Vec<Arc<Job>> {
        let base = if filter.running {
            self.running_jobs()
        } else {
            self.jobs()
        };
        base.into_iter()
            .filter(|job| job.has_tags(&filter.tags))
            .collect()
    }

    /// One-shot absolute-time jobs.
    #[must_use]
    pub fn at_jobs(&self) -> Vec<Arc<Job>> {
        self.jobs_of_kind(JobKind::At)
    }

    /// One-shot delayed jobs.
    #[must_use]
    pub fn in_jobs(&self) -> Vec<Arc<Job>> {
        self.jobs_of_kind(JobKind::In)
    }

    /// Fixed-interval jobs.
    #[must_use]
    pub fn every_jobs(&self) -> Vec<Arc<Job>> {
        self.jobs_of_kind(JobKind::Every)
    }

    /// Cron jobs.
    #[must_use]
    pub fn cron_jobs(&self) -> Vec<Arc<Job>> {
        self.jobs_of_kind(JobKind::Cron)
    }

    fn jobs_of_kind(&self, kind: JobKind) -> Vec<Arc<Job>> {
        self.jobs()
            .into_iter()
            .filter(|job| job.kind() == kind)
            .collect()
    }

    /// Jobs with at least one in-flight execution.
    #[must_use]
    pub fn running_jobs(&self) -> Vec<Arc<Job>> {
        self.core.workers.running_jobs()
    }

    // ── Scheduler control ─────────────────────────────────────────────

    /// Stop triggering jobs. The loop keeps running: time advances,
    /// unscheduled jobs are removed, and timeouts are enforced.
    pub fn pause(&self) {
        self.core.paused.store(true, Ordering::Release);
        info!("scheduler paused");
    }

    /// Resume triggering jobs.
    pub fn resume(&self) {
        self.core.paused.store(false, Ordering::Release);
        info!("scheduler resumed");
    }

    /// Whether triggering is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.core.paused.load(Ordering::Acquire)
    }

    /// Stop the scheduler loop.
    pub fn shutdown(&self, mode: ShutdownMode) {
        info!(?mode, "scheduler shutting down");
        *self.core.started_at.lock() = None;
        // Dropping the sender wakes the loop out of its tick sleep.
        *self.core.wake_tx.lock() = None;

        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if thread::current().id() == handle.thread().id() {
                // shutdown() called from a blocking job on the loop thread.
                debug!("shutdown from the loop thread, skipping self-join");
            } else {
                let _ = handle.join();
            }
        }

        match mode {
            ShutdownMode::Stop => {}
            ShutdownMode::Kill => {
                self.core.workers.interrupt_all(InterruptReason::Kill);
            }
            ShutdownMode::Wait => {
                while !self.core.workers.is_empty() {
                    thread::sleep(self.core.config.frequency());
                }
            }
        }
    }

    /// Unschedule every job, then wait until nothing is executing, polling
    /// at the tick rate.
    pub fn terminate_all_jobs(&self) {
        for job in self.jobs() {
            job.unschedule();
        }
        while !self.core.workers.is_empty() {
            thread::sleep(self.core.config.frequency());
        }
    }

    /// Time since the scheduler started, or `None` once shut down.
    #[must_use]
    pub fn uptime(&self) -> Option<chrono::Duration> {
        let started = *self.core.started_at.lock();
        started.map(|at| clock::now() - at)
    }

    /// [`uptime`](Self::uptime) as a canonical duration string.
    #[must_use]
    pub fn uptime_string(&self) -> Option<String> {
        self.uptime()
            .map(|d| format_duration(d.num_milliseconds() as f64 / 1000.0))
    }

    /// Block until the scheduler loop exits.
    pub fn join(&self) {
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// The scheduler's configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    // ── Hooks ─────────────────────────────────────────────────────────

    /// Install the handler receiving `(job, error)` for every callable
    /// failure. The default logs through `tracing`.
    pub fn set_error_handler(
        &self,
        handler: impl Fn(&Job, &anyhow::Error) + Send + Sync + 'static,
    ) {
        *self.core.error_handler.write() = Arc::new(handler);
    }

    /// Install a sink receiving every job lifecycle event.
    pub fn set_event_sink(&self, sink: impl EventSink + 'static) {
        *self.core.event_sink.write() = Some(Arc::new(sink));
    }
}

// ── The tick loop ─────────────────────────────────────────────────────

fn run_loop(core: &Arc<SchedulerCore>, wake_rx: &Receiver<()>) {
    debug!("scheduler loop started");
    loop {
        if core.started_at.lock().is_none() {
            break;
        }

        let removed = core.jobs.delete_unscheduled();
        for job in &removed {
            core.emit(JobEventKind::Unscheduled, job);
            debug!(job_id = %job.id(), "job removed");
        }

        if !core.paused.load(Ordering::Acquire) {
            trigger_due_jobs(core);
        }

        timeout_sweep(core);

        match wake_rx.recv_timeout(core.config.frequency()) {
            Err(RecvTimeoutError::Timeout) => {}
            // Woken early; the stop flag is re-checked at the loop top.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }
    debug!("scheduler loop exiting");
}

fn trigger_due_jobs(core: &Arc<SchedulerCore>) {
    let now = clock::now();
    let mut reschedule = Vec::new();
    while let Some(job) = core.jobs.shift(now) {
        if trigger_job(core, &job, now) {
            reschedule.push(job);
        }
    }
    if !reschedule.is_empty() {
        core.jobs.concat(reschedule);
    }
}

/// Fire one due job. Returns true when the job must be re-inserted.
fn trigger_job(core: &Arc<SchedulerCore>, job: &Arc<Job>, now: DateTime<Utc>) -> bool {
    let scheduled_time = job.next_time();

    match job.fire_decision() {
        FireDecision::DropUnscheduled => {
            core.emit(JobEventKind::Unscheduled, job);
            return false;
        }
        FireDecision::DropExhausted => {
            job.mark_done(now);
            core.emit(JobEventKind::Unscheduled, job);
            debug!(job_id = %job.id(), "job exhausted its limits");
            return false;
        }
        FireDecision::SkipPaused => return job.advance(now),
        FireDecision::Fire => {}
    }

    job.note_fire(now);
    core.emit(JobEventKind::Triggered, job);
    debug!(job_id = %job.id(), %scheduled_time, "triggering job");

    if job.is_blocking() {
        run_execution(core, job, scheduled_time, now);
    } else {
        spawn_worker(core, job, scheduled_time, now);
    }

    if job.is_periodic() {
        job.advance(now)
    } else {
        job.mark_done(now);
        false
    }
}

/// Spawn a fresh worker thread for one firing.
fn spawn_worker(
    core: &Arc<SchedulerCore>,
    job: &Arc<Job>,
    scheduled_time: DateTime<Utc>,
    fired_at: DateTime<Utc>,
) {
    let token = Arc::new(InterruptToken::new());
    let deadline = job.timeout_deadline(fired_at);
    let worker_id = core
        .workers
        .register(Arc::clone(job), fired_at, deadline, Arc::clone(&token));

    let spawned = thread::Builder::new()
        .name(format!(
            "{}-job-{}",
            core.config.thread_name_prefix,
            job.id()
        ))
        .stack_size(core.config.thread_stack_size)
        .spawn({
            let core = Arc::clone(core);
            let job = Arc::clone(job);
            move || {
                let run = JobRun::new(Arc::clone(&job), scheduled_time, fired_at, token);
                let outcome = execute_callable(&core, &job, &run);
                core.workers.deregister(worker_id);
                conclude_execution(&core, &job, &run, outcome);
            }
        });

    if let Err(e) = spawned {
        core.workers.deregister(worker_id);
        error!(job_id = %job.id(), error = %e, "failed to spawn worker thread");
    }
}

/// Run one firing inline on the loop thread (blocking jobs).
fn run_execution(
    core: &Arc<SchedulerCore>,
    job: &Arc<Job>,
    scheduled_time: DateTime<Utc>,
    fired_at: DateTime<Utc>,
) {
    let token = Arc::new(InterruptToken::new());
    let deadline = job.timeout_deadline(fired_at);
    let worker_id = core
        .workers
        .register(Arc::clone(job), fired_at, deadline, Arc::clone(&token));

    let run = JobRun::new(Arc::clone(job), scheduled_time, fired_at, token);
    let outcome = execute_callable(core, job, &run);
    core.workers.deregister(worker_id);
    conclude_execution(core, job, &run, outcome);
}

/// Acquire the job's named mutexes (in name order), then run the callable,
/// catching panics at the worker boundary. The RAII guards release on every
/// exit path.
fn execute_callable(
    core: &Arc<SchedulerCore>,
    job: &Arc<Job>,
    run: &JobRun,
) -> crate::core::error::AppResult<()> {
    let mutexes = core.named_mutexes(job.mutex_names());
    let _guards: Vec<_> = mutexes.iter().map(|mutex| mutex.lock()).collect();

    match catch_unwind(AssertUnwindSafe(|| job.invoke(run))) {
        Ok(outcome) => outcome,
        Err(panic) => Err(anyhow!("job callable panicked: {}", panic_message(&panic))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Classify a finished execution and notify the hooks.
fn conclude_execution(
    core: &Arc<SchedulerCore>,
    job: &Arc<Job>,
    run: &JobRun,
    outcome: crate::core::error::AppResult<()>,
) {
    match run.interrupted() {
        Some(InterruptReason::Timeout) => {
            job.record_interrupt(JobStatus::TimedOut);
            core.emit(JobEventKind::TimedOut, job);
            warn!(job_id = %job.id(), "job execution timed out");
            core.handle_error(job, &anyhow::Error::new(Error::Timeout));
            if job.is_periodic() && !job.timeout_reschedule() {
                job.unschedule();
            }
        }
        Some(InterruptReason::Kill) => {
            job.record_interrupt(JobStatus::Killed);
            core.emit(JobEventKind::Killed, job);
            warn!(job_id = %job.id(), "job execution killed");
        }
        None => match outcome {
            Ok(()) => {
                core.emit(JobEventKind::Completed, job);
                debug!(job_id = %job.id(), "job execution completed");
            }
            Err(error) => {
                core.emit(JobEventKind::Failed, job);
                core.handle_error(job, &error);
            }
        },
    }
}

/// Interrupt every registered execution whose deadline has elapsed.
fn timeout_sweep(core: &Arc<SchedulerCore>) {
    let now = clock::now();
    for worker in core.workers.snapshot() {
        if let Some(deadline) = worker.deadline {
            if now >= deadline && worker.token.reason().is_none() {
                warn!(
                    job_id = %worker.job.id(),
                    started_at = %worker.started_at,
                    "interrupting timed-out execution"
                );
                worker.token.interrupt(InterruptReason::Timeout);
            }
        }
    }
}
