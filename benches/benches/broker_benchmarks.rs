use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use subhub::{BrokerConfig, BrokerHandle, Registry, Subscription};

/// Регистрирует `count` подписчиков с буфером, которого хватит на весь
/// прогон.
fn populated(count: usize) -> (Registry<u64>, Vec<Subscription<u64>>) {
    let (mut registry, mut inbox) = Registry::new(count.max(1), 1);
    let requester = registry.requester();
    let subs = (0..count)
        .map(|_| {
            let pending = requester.request(u16::MAX, |_| true);
            let request = inbox.requests.try_recv().expect("queued");
            registry.receive(request);
            pending.wait_blocking()
        })
        .collect();
    (registry, subs)
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_broadcast");
    for count in [0usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (mut registry, mut subs) = populated(count);
            b.iter(|| {
                black_box(registry.broadcast(black_box(&42)));
                for sub in &mut subs {
                    let _ = sub.try_recv();
                }
            });
        });
    }
    group.finish();
}

fn bench_filtered_broadcast(c: &mut Criterion) {
    let (mut registry, mut inbox) = Registry::<u64>::new(100, 1);
    let requester = registry.requester();
    let _subs: Vec<_> = (0..100u64)
        .map(|i| {
            let pending = requester.request(1, move |v| *v == i + 1000);
            let request = inbox.requests.try_recv().expect("queued");
            registry.receive(request);
            pending.wait_blocking()
        })
        .collect();

    c.bench_function("registry_broadcast_100_filtered_out", |b| {
        b.iter(|| black_box(registry.broadcast(black_box(&7))))
    });
}

fn bench_subscribe_handshake(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let (handle, _join) = rt
        .block_on(async { BrokerHandle::<u64>::spawn(&BrokerConfig::default()) })
        .expect("broker");

    c.bench_function("broker_subscribe_unsubscribe", |b| {
        b.to_async(&rt).iter(|| async {
            let sub = handle.subscribe(|_| true).await;
            let _ = sub.unsubscribe();
            black_box(sub.id())
        });
    });
}

criterion_group!(
    benches,
    bench_broadcast,
    bench_filtered_broadcast,
    bench_subscribe_handshake
);
criterion_main!(benches);
