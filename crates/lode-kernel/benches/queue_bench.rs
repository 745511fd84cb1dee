//! Queue micro-benchmarks: owner path against foreign path.

use criterion::{criterion_group, criterion_main, Criterion};
use lode_kernel::{BiasedQueue, Lane, Task};

fn owner_push_pop(c: &mut Criterion) {
    let queue = BiasedQueue::new();
    c.bench_function("owner_push_pop", |b| {
        b.iter(|| {
            queue.push(Task::new(|| {}), Lane::Normal);
            queue.pop_owned()
        })
    });
}

fn owner_empty_check(c: &mut Criterion) {
    let queue = BiasedQueue::new();
    c.bench_function("owner_empty_check", |b| b.iter(|| queue.pop_owned()));
}

fn foreign_steal(c: &mut Criterion) {
    let queue = BiasedQueue::new();
    c.bench_function("foreign_steal", |b| {
        b.iter(|| {
            queue.push(Task::new(|| {}), Lane::Normal);
            queue.try_steal()
        })
    });
}

criterion_group!(benches, owner_push_pop, owner_empty_check, foreign_steal);
criterion_main!(benches);
