//! Throughput benchmarks for Fanout.
//!
//! These benchmarks measure the raw cost of hub operations.

use async_trait::async_trait;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tenvis_fanout_core::{handler_fn, Hub, Message, MessageHandler, Subscriber};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Never finishes handling, so the inbox stays full.
struct Stalled;

#[async_trait]
impl MessageHandler for Stalled {
    async fn handle(&self, _subscriber: &str, _message: Arc<Message>) {
        std::future::pending::<()>().await;
    }
}

fn quiet_subscriber(name: String) -> Subscriber {
    Subscriber::builder(name).handler(handler_fn(|_, _| {})).build()
}

fn hub_with(size: usize) -> (Hub, Vec<Subscriber>) {
    let hub = Hub::new();
    let subs: Vec<_> = (0..size)
        .map(|i| quiet_subscriber(format!("sub-{}", i)))
        .collect();
    for sub in &subs {
        hub.subscribe(CancellationToken::new(), sub).unwrap();
    }
    (hub, subs)
}

/// Benchmark hub operations.
fn bench_hub(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let mut group = c.benchmark_group("hub");

    // Subscribe + unsubscribe benchmark
    group.bench_function("subscribe_unsubscribe", |b| {
        let hub = Hub::new();
        let mut i = 0u64;
        b.iter(|| {
            let sub = quiet_subscriber(format!("sub:{}", i));
            i += 1;
            hub.subscribe(CancellationToken::new(), &sub).unwrap();
            hub.unsubscribe(black_box(&sub))
        });
    });

    // Publish with 1 subscriber
    group.bench_function("publish_1_sub", |b| {
        let (hub, _subs) = hub_with(1);
        let message = Arc::new(Message::new(vec![0u8; 64]));

        b.iter(|| hub.publish_shared(black_box(Arc::clone(&message))));
    });

    // Publish with 100 subscribers
    group.bench_function("publish_100_sub", |b| {
        let (hub, _subs) = hub_with(100);
        let message = Arc::new(Message::new(vec![0u8; 64]));

        b.iter(|| hub.publish_shared(black_box(Arc::clone(&message))));
    });

    // Publishing to full inboxes takes the drop path
    group.bench_function("publish_full_inbox", |b| {
        let hub = Hub::new();
        let sub = Subscriber::builder("stalled")
            .capacity(1)
            .handler(Stalled)
            .build();
        hub.subscribe(CancellationToken::new(), &sub).unwrap();
        let message = Arc::new(Message::new(vec![0u8; 64]));

        b.iter(|| hub.publish_shared(black_box(Arc::clone(&message))));
    });

    group.finish();
}

/// Benchmark fan-out scenarios.
fn bench_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let mut group = c.benchmark_group("fanout");

    for size in [10, 100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (hub, _subs) = hub_with(size);
            let payload = Bytes::from(vec![0u8; 64]);

            b.iter(|| hub.publish(black_box(payload.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hub, bench_fanout);
criterion_main!(benches);
