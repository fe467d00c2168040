//! Queue and quota hot-path benchmark
//!
//! Every guest request takes the quota lock and the queue lock, so both
//! paths should stay well under a millisecond with a full party queue.

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use jbox_common::OperationKind;
use jbox_server::queue::{EnqueueRequest, QueueEngine, TrackInfo};
use jbox_server::quota::QuotaLimiter;

fn request(n: usize) -> EnqueueRequest {
    let track = TrackInfo {
        id: n.to_string(),
        name: format!("Song {}", n),
        artists: "Band".to_string(),
        album: None,
        album_pic: None,
        duration_ms: Some(200_000),
    };
    EnqueueRequest::new(track, format!("guest{}", n % 20), format!("10.0.0.{}", n % 20))
}

fn filled_queue(len: usize) -> QueueEngine {
    let mut engine = QueueEngine::new();
    engine.enqueue_many((0..len).map(request));
    engine
}

fn bench_queue_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_operations");

    group.bench_function("enqueue_into_200", |b| {
        b.iter_batched(
            || filled_queue(200),
            |mut engine| black_box(engine.enqueue(request(200))),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("promote_tail_of_200", |b| {
        b.iter_batched(
            || {
                let engine = filled_queue(200);
                let tail = engine.pending().back().map(|item| item.queue_id);
                (engine, tail)
            },
            |(mut engine, tail)| {
                if let Some(id) = tail {
                    black_box(engine.promote_song(id, "bench").ok());
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("advance_through_200", |b| {
        b.iter_batched(
            || filled_queue(200),
            |mut engine| while engine.advance().is_some() {},
            BatchSize::SmallInput,
        );
    });

    group.bench_function("snapshot_of_200", |b| {
        let engine = filled_queue(200);
        b.iter(|| black_box(engine.snapshot()));
    });

    group.finish();
}

fn bench_quota_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("quota_operations");
    let now = jbox_common::time::now();

    group.bench_function("check_and_record", |b| {
        let mut quota = QuotaLimiter::with_defaults();
        let mut tick = 0i64;
        b.iter(|| {
            tick += 1;
            let at = now + Duration::seconds(tick * 30);
            if quota.check_at("10.0.0.5", OperationKind::Song, false, at).is_ok() {
                let _ = quota.record_at("10.0.0.5", OperationKind::Song, None, at);
            }
        });
    });

    group.bench_function("cleanup_1000_actors", |b| {
        b.iter_batched(
            || {
                let mut quota = QuotaLimiter::with_defaults();
                for i in 0..1000 {
                    let actor = format!("10.0.{}.{}", i / 250, i % 250);
                    let _ = quota.record_at(&actor, OperationKind::Skip, None, now);
                }
                quota
            },
            |mut quota| black_box(quota.cleanup_at(now + Duration::hours(1))),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_queue_operations, bench_quota_operations);
criterion_main!(benches);
