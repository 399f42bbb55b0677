//! Demo scenario.
//!
//! Subscribes the configured subscribers, publishes a batch, lets the
//! delivery loops drain, drops the last subscriber and publishes again.

use crate::config::DemoConfig;
use crate::metrics;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tenvis_fanout_core::{Hub, HubStats, Message, Subscriber};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Messages published after the last subscriber leaves.
const TRAILING_MESSAGES: usize = 2;

/// Run the scenario until done or until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if a subscriber cannot be registered.
pub async fn run(config: &DemoConfig, shutdown: CancellationToken) -> Result<HubStats> {
    let hub = Hub::new();
    let settle = Duration::from_millis(config.settle_ms);

    let subscribers: Vec<Subscriber> = config
        .subscribers
        .iter()
        .map(|name| Subscriber::with_capacity(name.clone(), config.inbox_capacity))
        .collect();

    for subscriber in &subscribers {
        hub.subscribe(shutdown.child_token(), subscriber)
            .with_context(|| format!("Failed to subscribe {}", subscriber.name()))?;
    }
    metrics::set_active_subscribers(hub.subscriber_count());
    info!(subscribers = hub.subscriber_count(), "Subscribers registered");

    let mut seq = 0;
    for _ in 0..config.messages {
        seq += 1;
        publish(&hub, seq);
    }
    settle_or_shutdown(settle, &shutdown).await;

    if let Some(last) = subscribers.last() {
        if hub.unsubscribe(last) {
            info!(subscriber = %last.name(), "Unsubscribed");
        }
    }
    metrics::set_active_subscribers(hub.subscriber_count());

    for _ in 0..TRAILING_MESSAGES {
        seq += 1;
        publish(&hub, seq);
    }
    settle_or_shutdown(settle, &shutdown).await;

    hub.shutdown().await;
    Ok(hub.stats())
}

fn publish(hub: &Hub, seq: usize) {
    let payload = format!("test{:02}", seq);
    let outcome = hub.publish_outcome(Arc::new(Message::new(payload.into_bytes())));
    metrics::record_publish(outcome);
}

async fn settle_or_shutdown(settle: Duration, shutdown: &CancellationToken) {
    tokio::select! {
        () = tokio::time::sleep(settle) => {}
        () = shutdown.cancelled() => {}
    }
}
