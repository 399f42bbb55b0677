//! Metrics collection and export for the Fanout demo.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tenvis_fanout_core::{HubStats, PublishOutcome};
use tracing::info;

/// Metric names.
pub mod names {
    pub const PUBLISHED_TOTAL: &str = "fanout_published_total";
    pub const DELIVERED_TOTAL: &str = "fanout_delivered_total";
    pub const DROPPED_TOTAL: &str = "fanout_dropped_total";
    pub const SUBSCRIBERS_ACTIVE: &str = "fanout_subscribers_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::PUBLISHED_TOTAL, "Total number of publish calls");
    metrics::describe_counter!(
        names::DELIVERED_TOTAL,
        "Total number of messages accepted by subscriber inboxes"
    );
    metrics::describe_counter!(
        names::DROPPED_TOTAL,
        "Total number of messages dropped on full inboxes"
    );
    metrics::describe_gauge!(
        names::SUBSCRIBERS_ACTIVE,
        "Current number of registered subscribers"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record one publish call and its fan-out result.
pub fn record_publish(outcome: PublishOutcome) {
    counter!(names::PUBLISHED_TOTAL).increment(1);
    counter!(names::DELIVERED_TOTAL).increment(outcome.delivered as u64);
    counter!(names::DROPPED_TOTAL).increment(outcome.dropped as u64);
}

/// Update the active subscriber gauge.
pub fn set_active_subscribers(count: usize) {
    gauge!(names::SUBSCRIBERS_ACTIVE).set(count as f64);
}

/// Log a final statistics summary.
pub fn report(stats: &HubStats) {
    set_active_subscribers(stats.subscribers);
    info!(
        published = stats.published,
        delivered = stats.delivered,
        dropped = stats.dropped,
        subscribers = stats.subscribers,
        active_tasks = stats.active_tasks,
        "Hub statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        // No recorder installed: calls are no-ops
        record_publish(PublishOutcome {
            delivered: 2,
            dropped: 1,
        });
        set_active_subscribers(2);
    }
}
