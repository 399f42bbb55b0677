//! # Fanout Demo
//!
//! Drives a Fanout hub through a short publish/unsubscribe scenario.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! fanout
//!
//! # Run with a config file in the working directory
//! cp fanout.toml.example fanout.toml && fanout
//!
//! # Run with an explicit config file
//! FANOUT_CONFIG=~/fanout.toml fanout
//!
//! # Run with environment variables
//! FANOUT_DEMO__SETTLE_MS=200 RUST_LOG=info fanout
//! ```

mod config;
mod demo;
mod metrics;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        subscribers = config.demo.subscribers.len(),
        messages = config.demo.messages,
        "Starting Fanout demo"
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Ctrl-C cancels every subscription
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let stats = demo::run(&config.demo, shutdown).await?;
    metrics::report(&stats);

    Ok(())
}
