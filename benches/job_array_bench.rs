//! Benchmarks for the scheduler hot paths:
//! - temporal spec parsing (durations, cron lines)
//! - next-fire-time computation
//! - job store insertion and lookup through the public API

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use chime::{format_duration, parse_duration, CronLine, Scheduler, SchedulerConfig};
use chrono::{TimeZone, Utc};

fn bench_duration_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("duration");

    group.bench_function("parse_compound", |b| {
        b.iter(|| parse_duration(black_box("1y2w3d4h5m6s")).unwrap());
    });
    group.bench_function("parse_bare", |b| {
        b.iter(|| parse_duration(black_box("500")).unwrap());
    });
    group.bench_function("format", |b| {
        b.iter(|| format_duration(black_box(90_061.5)));
    });

    group.finish();
}

fn bench_cron(c: &mut Criterion) {
    let mut group = c.benchmark_group("cron");
    let from = Utc.with_ymd_and_hms(2030, 1, 10, 12, 2, 0).unwrap();

    group.bench_function("parse", |b| {
        b.iter(|| CronLine::parse(black_box("*/5 8-18 * * Mon-Fri")).unwrap());
    });

    // The leap-day line exercises the long carry path; it still resolves,
    // just years out.
    for expr in ["* * * * *", "*/5 * * * *", "0 9 1 * *", "0 0 29 2 *"] {
        let line = CronLine::parse(expr).unwrap();
        group.bench_with_input(BenchmarkId::new("next_after", expr), &line, |b, line| {
            b.iter(|| line.next_after(black_box(from)).unwrap());
        });
    }

    group.finish();
}

fn bench_job_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_store");

    // A populated scheduler: far-future one-shots so nothing fires.
    let scheduler =
        Scheduler::with_config(SchedulerConfig::new().with_frequency_ms(1000)).unwrap();
    let far_out = Utc::now() + chrono::Duration::days(365);
    let mut ids = Vec::new();
    for _ in 0..1_000 {
        ids.push(scheduler.at(far_out, || {}).unwrap());
    }

    group.throughput(Throughput::Elements(1));
    group.bench_function("schedule_insert_1k", |b| {
        b.iter(|| scheduler.at(black_box(far_out), || {}).unwrap());
    });
    group.bench_function("lookup_by_id", |b| {
        b.iter(|| scheduler.job(black_box(&ids[500])).unwrap());
    });
    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(scheduler.jobs().len()));
    });

    group.finish();
    scheduler.shutdown(chime::ShutdownMode::Stop);
}

criterion_group!(
    benches,
    bench_duration_strings,
    bench_cron,
    bench_job_store
);
criterion_main!(benches);
