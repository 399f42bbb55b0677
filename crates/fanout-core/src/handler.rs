//! Message handlers.
//!
//! A handler is what a subscriber's delivery loop does with each message
//! taken from its inbox. The loop awaits the handler before taking the next
//! message, so a slow handler only slows down its own subscriber.

use crate::message::Message;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Processes messages delivered to a subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message for the subscriber named `subscriber`.
    async fn handle(&self, subscriber: &str, message: Arc<Message>);
}

/// Default handler: logs every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

#[async_trait]
impl MessageHandler for LogHandler {
    async fn handle(&self, subscriber: &str, message: Arc<Message>) {
        info!(
            subscriber = %subscriber,
            payload = %String::from_utf8_lossy(message.payload()),
            "Message received"
        );
    }
}

/// Adapts a synchronous closure into a [`MessageHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&str, Arc<Message>) + Send + Sync + 'static,
{
    async fn handle(&self, subscriber: &str, message: Arc<Message>) {
        (self.f)(subscriber, message);
    }
}

/// Wrap a closure as a handler.
#[must_use]
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&str, Arc<Message>) + Send + Sync + 'static,
{
    FnHandler { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_fn_handler_invoked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = Arc::clone(&seen);
            handler_fn(move |name, msg| {
                seen.lock()
                    .unwrap()
                    .push((name.to_string(), msg.payload().clone()));
            })
        };

        handler.handle("sub01", Arc::new(Message::from("test01"))).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "sub01");
        assert_eq!(&seen[0].1[..], b"test01");
    }

    #[tokio::test]
    async fn test_log_handler_does_not_panic() {
        LogHandler
            .handle("sub01", Arc::new(Message::new(vec![0xff, 0xfe])))
            .await;
    }
}
