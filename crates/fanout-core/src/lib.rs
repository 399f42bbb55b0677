//! # fanout-core
//!
//! In-process publish/subscribe for the Fanout engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - Membership registry and best-effort fan-out
//! - **Subscriber** - Bounded inbox plus its own delivery loop
//! - **Shutdown** - Signal-once primitive used to stop delivery loops
//! - **Message** - Shared, read-only payload
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ publish ┌─────────────┐ try_send ┌─────────────┐
//! │  Publisher  │────────▶│     Hub     │─────────▶│    Inbox    │
//! └─────────────┘         └─────────────┘          └─────────────┘
//!                                │                        │
//!                                ▼                        ▼
//!                         ┌─────────────┐          ┌─────────────┐
//!                         │   Watcher   │          │Delivery loop│
//!                         └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tenvis_fanout_core::{Hub, Subscriber};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let hub = Hub::new();
//! let sub = Subscriber::new("sub01");
//!
//! hub.subscribe(CancellationToken::new(), &sub).unwrap();
//! assert_eq!(hub.subscriber_count(), 1);
//!
//! hub.publish("hello");
//! hub.unsubscribe(&sub);
//! hub.shutdown().await;
//! # }
//! ```

pub mod handler;
pub mod hub;
pub mod message;
pub mod signal;
pub mod subscriber;

pub use handler::{handler_fn, FnHandler, LogHandler, MessageHandler};
pub use hub::{Hub, HubError, HubStats, PublishOutcome};
pub use message::Message;
pub use signal::Shutdown;
pub use subscriber::{
    Subscriber, SubscriberBuilder, SubscriberId, SubscriberState, DEFAULT_INBOX_CAPACITY,
};
