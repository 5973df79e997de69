//! Integration tests for job management: enumeration, tagging, pausing,
//! unscheduling, lifecycle events, and shutdown modes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chime::{
    Error, InMemoryEventSink, JobEventKind, JobFilter, JobOpts, JobRun, JobStatus, Scheduler,
    SchedulerConfig, ShutdownMode,
};

fn fast_scheduler() -> Scheduler {
    chime::util::init_tracing();
    Scheduler::with_config(SchedulerConfig::new().with_frequency_ms(10)).unwrap()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

fn wait_until(timeout_ms: u64, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        sleep_ms(5);
    }
    predicate()
}

// ============================================================================
// ENUMERATION AND TAGS
// ============================================================================

#[test]
fn jobs_enumerate_by_kind() {
    let scheduler = fast_scheduler();

    scheduler.at(chrono::Utc::now() + chrono::Duration::hours(1), || {}).unwrap();
    scheduler.in_("1h", || {}).unwrap();
    scheduler.every("1h", || {}).unwrap();
    scheduler.cron("0 0 * * *", || {}).unwrap();

    assert_eq!(scheduler.jobs().len(), 4);
    assert_eq!(scheduler.at_jobs().len(), 1);
    assert_eq!(scheduler.in_jobs().len(), 1);
    assert_eq!(scheduler.every_jobs().len(), 1);
    assert_eq!(scheduler.cron_jobs().len(), 1);
    assert!(scheduler.running_jobs().is_empty());

    scheduler.shutdown(ShutdownMode::Stop);
}

#[test]
fn tag_filter_requires_every_tag() {
    let scheduler = fast_scheduler();

    scheduler
        .every_with("1h", || {}, JobOpts::new().with_tags(["reports", "daily"]))
        .unwrap();
    scheduler
        .every_with("1h", || {}, JobOpts::new().with_tag("reports"))
        .unwrap();

    let both = JobFilter {
        tags: vec!["reports".into(), "daily".into()],
        ..JobFilter::default()
    };
    let one = JobFilter {
        tags: vec!["reports".into()],
        ..JobFilter::default()
    };
    assert_eq!(scheduler.jobs_matching(&both).len(), 1);
    assert_eq!(scheduler.jobs_matching(&one).len(), 2);

    scheduler.shutdown(ShutdownMode::Stop);
}

#[test]
fn running_jobs_are_a_subset_of_jobs() {
    let scheduler = fast_scheduler();

    scheduler
        .in_("20ms", |run: &JobRun| {
            let _ = run.sleep(Duration::from_millis(300));
        })
        .unwrap();

    assert!(wait_until(1000, || !scheduler.running_jobs().is_empty()));
    let running = scheduler.running_jobs();
    let all = scheduler.jobs();
    for job in &running {
        assert!(all.iter().any(|j| j.id() == job.id()));
    }
    assert!(running[0].is_running());

    scheduler.shutdown(ShutdownMode::Wait);
}

#[test]
fn lookup_and_unschedule_unknown_ids() {
    let scheduler = fast_scheduler();
    assert!(scheduler.job("every-99").is_none());
    assert!(matches!(
        scheduler.unschedule("every-99"),
        Err(Error::NotFound(_))
    ));
    scheduler.shutdown(ShutdownMode::Stop);
}

// ============================================================================
// UNSCHEDULING
// ============================================================================

#[test]
fn unscheduled_job_is_swept_and_stops_firing() {
    let scheduler = fast_scheduler();
    let fired = counter();

    let c = Arc::clone(&fired);
    let id = scheduler
        .every("50ms", move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(2000, || fired.load(Ordering::SeqCst) >= 1));
    scheduler.unschedule(&id).unwrap();
    let job = scheduler.job(&id);
    assert!(job.is_none() || job.unwrap().unscheduled_at().is_some());

    // Swept by the next tick.
    assert!(wait_until(1000, || scheduler.job(&id).is_none()));
    let fired_so_far = fired.load(Ordering::SeqCst);
    sleep_ms(200);
    assert_eq!(fired.load(Ordering::SeqCst), fired_so_far);

    scheduler.shutdown(ShutdownMode::Wait);
}

#[test]
fn terminate_all_jobs_clears_everything() {
    let scheduler = fast_scheduler();

    scheduler.every("30ms", || {}).unwrap();
    scheduler.every("40ms", || {}).unwrap();
    scheduler.in_("1h", || {}).unwrap();

    scheduler.terminate_all_jobs();
    assert!(scheduler.running_jobs().is_empty());
    assert!(wait_until(1000, || scheduler.jobs().is_empty()));

    scheduler.shutdown(ShutdownMode::Stop);
}

// ============================================================================
// PAUSE / RESUME
// ============================================================================

#[test]
fn scheduler_pause_stops_triggering_only() {
    let scheduler = fast_scheduler();
    let fired = counter();

    scheduler.pause();
    assert!(scheduler.is_paused());

    let c = Arc::clone(&fired);
    let id = scheduler
        .every("30ms", move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    sleep_ms(200);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // Unschedule sweeps still run while paused.
    scheduler.unschedule(&id).unwrap();
    assert!(wait_until(1000, || scheduler.job(&id).is_none()));

    let c = Arc::clone(&fired);
    scheduler
        .every("30ms", move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    scheduler.resume();
    assert!(!scheduler.is_paused());
    assert!(wait_until(2000, || fired.load(Ordering::SeqCst) >= 1));

    scheduler.shutdown(ShutdownMode::Wait);
}

#[test]
fn paused_job_skips_fires_but_keeps_its_slot() {
    let scheduler = fast_scheduler();
    let fired = counter();

    let c = Arc::clone(&fired);
    let job = scheduler
        .schedule_every(
            "40ms",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            JobOpts::new(),
        )
        .unwrap();

    assert!(wait_until(2000, || fired.load(Ordering::SeqCst) >= 1));
    job.pause().unwrap();
    assert!(job.is_paused());
    let frozen = fired.load(Ordering::SeqCst);
    sleep_ms(250);
    // A skipped tick may already have been in flight when we paused.
    assert!(fired.load(Ordering::SeqCst) <= frozen + 1);
    // Still scheduled the whole time.
    assert!(scheduler.job(job.id()).is_some());

    job.resume().unwrap();
    let resumed_from = fired.load(Ordering::SeqCst);
    assert!(wait_until(2000, || fired.load(Ordering::SeqCst) > resumed_from));

    scheduler.shutdown(ShutdownMode::Wait);
}

// ============================================================================
// BLOCKING JOBS
// ============================================================================

#[test]
fn blocking_job_runs_on_the_loop_thread() {
    let scheduler = Scheduler::with_config(
        SchedulerConfig::new()
            .with_frequency_ms(10)
            .with_thread_name_prefix("blocky"),
    )
    .unwrap();
    let observed = Arc::new(parking_lot::Mutex::new(String::new()));

    let seen = Arc::clone(&observed);
    scheduler
        .in_with(
            "20ms",
            move || {
                let name = std::thread::current().name().unwrap_or("").to_string();
                *seen.lock() = name;
            },
            JobOpts::new().with_blocking(true),
        )
        .unwrap();

    assert!(wait_until(1000, || *observed.lock() == "blocky-tick"));
    scheduler.shutdown(ShutdownMode::Wait);
}

// ============================================================================
// LIFECYCLE EVENTS
// ============================================================================

#[test]
fn one_shot_lifecycle_is_recorded() {
    let scheduler = fast_scheduler();
    let sink = Arc::new(InMemoryEventSink::new(64));
    scheduler.set_event_sink(SharedSink(Arc::clone(&sink)));

    let id = scheduler.in_("30ms", || {}).unwrap();

    assert!(wait_until(1000, || {
        sink.events()
            .iter()
            .any(|e| e.kind == JobEventKind::Completed)
    }));

    let kinds: Vec<JobEventKind> = sink
        .events()
        .iter()
        .filter(|e| e.job_id == id)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            JobEventKind::Scheduled,
            JobEventKind::Triggered,
            JobEventKind::Completed
        ]
    );

    scheduler.shutdown(ShutdownMode::Wait);
}

#[test]
fn unschedule_and_pause_events_are_recorded() {
    let scheduler = fast_scheduler();
    let sink = Arc::new(InMemoryEventSink::new(64));
    scheduler.set_event_sink(SharedSink(Arc::clone(&sink)));

    let job = scheduler
        .schedule_every("1h", || {}, JobOpts::new())
        .unwrap();
    job.pause().unwrap();
    job.resume().unwrap();
    job.unschedule();

    assert!(wait_until(1000, || {
        sink.events()
            .iter()
            .any(|e| e.kind == JobEventKind::Unscheduled)
    }));
    let kinds: Vec<JobEventKind> = sink.events().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&JobEventKind::Paused));
    assert!(kinds.contains(&JobEventKind::Resumed));

    scheduler.shutdown(ShutdownMode::Stop);
}

/// Adapter: the tests keep a handle on the sink while the scheduler owns
/// one too.
struct SharedSink(Arc<InMemoryEventSink>);

impl chime::EventSink for SharedSink {
    fn record(&self, event: chime::JobEvent) {
        self.0.record(event);
    }
}

// ============================================================================
// SHUTDOWN MODES
// ============================================================================

#[test]
fn shutdown_kill_interrupts_in_flight_executions() {
    let scheduler = fast_scheduler();
    let completed = counter();

    let c = Arc::clone(&completed);
    let job = scheduler
        .schedule_in(
            "20ms",
            move |run: &JobRun| -> anyhow::Result<()> {
                run.sleep(Duration::from_secs(30))?;
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            JobOpts::new(),
        )
        .unwrap();

    assert!(wait_until(1000, || !scheduler.running_jobs().is_empty()));
    scheduler.shutdown(ShutdownMode::Kill);

    // The worker observes the kill and deregisters within a tick or two.
    assert!(wait_until(1000, || scheduler.running_jobs().is_empty()));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert!(wait_until(500, || job.status() == JobStatus::Killed));
}

#[test]
fn shutdown_wait_drains_in_flight_executions() {
    let scheduler = fast_scheduler();
    let completed = counter();

    let c = Arc::clone(&completed);
    scheduler
        .in_("20ms", move || {
            std::thread::sleep(Duration::from_millis(200));
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(1000, || !scheduler.running_jobs().is_empty()));
    scheduler.shutdown(ShutdownMode::Wait);

    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert!(scheduler.running_jobs().is_empty());
}

#[test]
fn uptime_reports_until_shutdown() {
    let scheduler = fast_scheduler();
    sleep_ms(50);
    assert!(scheduler.uptime().unwrap().num_milliseconds() >= 50);
    assert!(scheduler.uptime_string().is_some());

    scheduler.shutdown(ShutdownMode::Stop);
    assert!(scheduler.uptime().is_none());
    assert!(scheduler.uptime_string().is_none());
}

#[test]
fn join_returns_after_shutdown() {
    let scheduler = fast_scheduler();
    let waiter = scheduler.clone();
    let handle = std::thread::spawn(move || waiter.join());

    sleep_ms(50);
    scheduler.shutdown(ShutdownMode::Stop);
    handle.join().unwrap();
}
