use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use herald_dispatcher::{Delivery, Dispatcher, Executor, SubscribeOptions};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
        .expect("Failed to build benchmark runtime");

    let modes = [
        ("inline", Delivery::Inline),
        ("detached", Delivery::Detached),
        ("transactional", Delivery::Transactional),
    ];

    for handlers in [1usize, 8, 32] {
        for (label, delivery) in modes {
            let dispatcher = Dispatcher::<u64>::builder()
                .name("bench")
                .executor(Executor::Tokio(runtime.handle().clone()))
                .build();
            let sum = Arc::new(AtomicU64::new(0));
            for _ in 0..handlers {
                let sum = Arc::clone(&sum);
                dispatcher.subscribe_with(SubscribeOptions::new().delivery(delivery), move |n| {
                    sum.fetch_add(n, Ordering::Relaxed);
                });
            }

            group.bench_with_input(BenchmarkId::new(label, handlers), &dispatcher, |b, d| {
                b.iter(|| {
                    d.dispatch(black_box(1)).unwrap();
                    d.wait();
                });
            });
        }
    }

    group.finish();
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let dispatcher = Dispatcher::<u64>::builder().executor(Executor::Threads).build();
    for _ in 0..64 {
        dispatcher.subscribe(|n| {
            black_box(n);
        });
    }

    c.bench_function("subscribe_unsubscribe_64", |b| {
        b.iter(|| {
            let sub = dispatcher.subscribe(|n| {
                black_box(n);
            });
            black_box(sub.unsubscribe());
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_subscribe_unsubscribe);
criterion_main!(benches);
