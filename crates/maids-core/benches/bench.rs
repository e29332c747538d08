use core::hint::black_box;
use core::num::NonZeroUsize;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use maids_core::{
    Allocator, AppId, BatchCoordinator, ConditionalStore, IdGenerator, MemoryStore,
    SequentialGenerator, UuidV4Generator,
};
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;

// Records per batch, matching the default request maximum.
const BATCH_SIZE: usize = 50;

fn candidates<G: IdGenerator>(generator: &G) -> Vec<AppId> {
    (0..BATCH_SIZE)
        .map(|_| AppId::generate("bench", generator))
        .collect()
}

/// Benchmarks a batch of fresh generated IDs, so every insert applies on the
/// first attempt.
fn bench_fresh_batch(c: &mut Criterion, group_name: &str, concurrency: usize) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(BATCH_SIZE as u64));

    group.bench_function(format!("elems/{BATCH_SIZE}"), |b| {
        let rt = Builder::new_multi_thread()
            .enable_all()
            .worker_threads(1)
            .build()
            .unwrap();

        b.to_async(&rt).iter_custom(|iters| async move {
            let store = Arc::new(MemoryStore::new());
            let coordinator = BatchCoordinator::new(
                Allocator::new(store, UuidV4Generator),
                NonZeroUsize::new(concurrency).unwrap(),
            );
            let start = Instant::now();

            for _ in 0..iters {
                let records = candidates(&UuidV4Generator);
                black_box(coordinator.allocate_all(records, 3).await);
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks a batch where every initial ID collides and must be regenerated
/// once before it applies.
fn bench_colliding_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory/colliding");
    group.throughput(Throughput::Elements(BATCH_SIZE as u64));

    group.bench_function(format!("elems/{BATCH_SIZE}"), |b| {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();

        b.to_async(&rt).iter_custom(|iters| async move {
            let mut elapsed = core::time::Duration::ZERO;

            for _ in 0..iters {
                let store = Arc::new(MemoryStore::new());
                let seeds = SequentialGenerator::new("taken");
                let records = candidates(&seeds);
                for record in &records {
                    store.insert_if_absent(record).await.unwrap();
                }
                let coordinator = BatchCoordinator::sequential(Allocator::new(
                    store,
                    SequentialGenerator::new("fresh"),
                ));

                let start = Instant::now();
                black_box(coordinator.allocate_all(records, 1).await);
                elapsed += start.elapsed();
            }

            elapsed
        });
    });

    group.finish();
}

fn benchmark_memory_sequential(c: &mut Criterion) {
    bench_fresh_batch(c, "memory/sequential", 1);
}

fn benchmark_memory_buffered(c: &mut Criterion) {
    bench_fresh_batch(c, "memory/buffered_8", 8);
}

fn benchmark_memory_colliding(c: &mut Criterion) {
    bench_colliding_batch(c);
}

criterion_group!(
    benches,
    benchmark_memory_sequential,
    benchmark_memory_buffered,
    benchmark_memory_colliding,
);
criterion_main!(benches);
