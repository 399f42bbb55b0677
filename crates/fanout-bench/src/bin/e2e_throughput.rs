//! End-to-end throughput benchmark for Fanout.
//!
//! A single publisher blasts messages at a hub while every subscriber's
//! handler counts what it actually processed.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenvis_fanout_core::{handler_fn, Hub, Subscriber};
use tokio_util::sync::CancellationToken;

const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_subscribers = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let capacity = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(tenvis_fanout_core::DEFAULT_INBOX_CAPACITY);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║         Fanout End-to-End Throughput Benchmark               ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Usage: e2e_throughput [subscribers] [inbox_capacity]        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_fanout_benchmark(num_subscribers, capacity).await;
}

async fn run_fanout_benchmark(num_subscribers: usize, capacity: usize) {
    println!(
        "📊 Fan-out Benchmark: {} subscribers, inbox capacity {}",
        num_subscribers, capacity
    );
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let hub = Arc::new(Hub::new());
    let processed = Arc::new(AtomicU64::new(0));

    for i in 0..num_subscribers {
        let processed = Arc::clone(&processed);
        let sub = Subscriber::builder(format!("sub-{}", i))
            .capacity(capacity)
            .handler(handler_fn(move |_, _| {
                processed.fetch_add(1, Ordering::Relaxed);
            }))
            .build();
        if let Err(e) = hub.subscribe(CancellationToken::new(), &sub) {
            eprintln!("Subscriber {} error: {}", i, e);
        }
    }
    println!("✓ {} subscribers registered", hub.subscriber_count());

    // Publisher task - no waiting, just blast messages
    let stop = CancellationToken::new();
    let publisher = {
        let hub = Arc::clone(&hub);
        let stop = stop.clone();
        tokio::spawn(async move {
            let payload = Bytes::from(vec![0u8; 64]);
            while !stop.is_cancelled() {
                hub.publish(payload.clone());
                // Small yield to not starve the delivery loops
                tokio::task::yield_now().await;
            }
        })
    };

    // Warmup phase
    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    // Reset counters and start measurement
    processed.store(0, Ordering::SeqCst);
    let before = hub.stats();
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let after = hub.stats();
    let total_processed = processed.load(Ordering::SeqCst);

    stop.cancel();
    let _ = publisher.await;
    hub.shutdown().await;

    let secs = elapsed.as_secs_f64();
    let publishes_per_sec = (after.published - before.published) as f64 / secs;
    let delivered_per_sec = (after.delivered - before.delivered) as f64 / secs;
    let dropped = after.dropped - before.dropped;
    let processed_per_sec = total_processed as f64 / secs;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Subscribers:          {:>10}                           ║",
        num_subscribers
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        secs
    );
    println!(
        "║  Publishes:            {:>10.0} msg/s                    ║",
        publishes_per_sec
    );
    println!(
        "║  Enqueued:             {:>10.0} msg/s                    ║",
        delivered_per_sec
    );
    println!(
        "║  Processed:            {:>10.0} msg/s                    ║",
        processed_per_sec
    );
    println!(
        "║  Dropped:              {:>10}                           ║",
        dropped
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
}
