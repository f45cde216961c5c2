use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use msghub::{DeliveryAction, GenericMessage, Hub};

type Tick = GenericMessage<u64>;

fn hub_with_subscribers(count: usize) -> Hub {
    let hub = Hub::new();
    let sum = Arc::new(AtomicU64::new(0));
    for _ in 0..count {
        let sum = sum.clone();
        hub.subscribe(move |m: &Tick| {
            sum.fetch_add(*m.content(), Ordering::Relaxed);
        });
    }
    hub
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let hub = Hub::new();
    c.bench_function("hub_subscribe_unsubscribe", |b| {
        b.iter(|| {
            let token = hub.subscribe(|_: &Tick| {});
            hub.unsubscribe::<Tick>(black_box(&token)).unwrap();
        })
    });
}

fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_publish_fanout");
    for subscribers in [0usize, 1, 10, 100] {
        let hub = hub_with_subscribers(subscribers);
        group.throughput(Throughput::Elements(subscribers.max(1) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| hub.publish(black_box(Tick::anonymous(1))).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_publish_filtered(c: &mut Criterion) {
    let hub = Hub::new();
    for divisor in 1..=10u64 {
        hub.subscribe_filtered(|_: &Tick| {}, move |m: &Tick| m.content() % divisor == 0);
    }
    let mut n = 0u64;
    c.bench_function("hub_publish_10_filtered", |b| {
        b.iter(|| {
            n = n.wrapping_add(1);
            hub.publish(black_box(Tick::anonymous(n))).unwrap();
        })
    });
}

fn bench_publish_weak(c: &mut Criterion) {
    let hub = Hub::new();
    let actions: Vec<DeliveryAction<Tick>> = (0..10)
        .map(|_| Arc::new(|_: &Tick| {}) as DeliveryAction<Tick>)
        .collect();
    for action in &actions {
        hub.subscribe_weak(action);
    }
    c.bench_function("hub_publish_10_weak", |b| {
        b.iter(|| hub.publish(black_box(Tick::anonymous(1))).unwrap())
    });
}

fn bench_publish_async(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let hub = hub_with_subscribers(10);
    c.bench_function("hub_publish_async_10_subs", |b| {
        b.to_async(&runtime).iter(|| async {
            hub.publish_async(Tick::anonymous(1))
                .unwrap()
                .await
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_subscribe_unsubscribe,
    bench_publish_fanout,
    bench_publish_filtered,
    bench_publish_weak,
    bench_publish_async,
);
criterion_main!(benches);
