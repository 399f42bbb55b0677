//! Subscribers for Fanout.
//!
//! A subscriber owns a bounded inbox and, once registered with a hub, a
//! delivery loop that drains it into the subscriber's handler.

use crate::handler::{LogHandler, MessageHandler};
use crate::message::Message;
use crate::signal::Shutdown;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default inbox capacity.
pub const DEFAULT_INBOX_CAPACITY: usize = 100;

/// Atomic counter for process-unique subscriber IDs.
static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque subscriber identity.
///
/// Two subscribers with the same name are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{:x}", self.0)
    }
}

/// Subscriber lifecycle state.
///
/// Transitions only move forward: `Created` -> `Registered` ->
/// `Unregistered` -> `Terminated`. A subscriber whose loop exits on its own
/// (cancellation, or a panicking handler) may skip straight from
/// `Registered` to `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubscriberState {
    /// Not yet registered with a hub.
    Created = 0,
    /// Registered; the delivery loop is running.
    Registered = 1,
    /// Removed from the hub; the delivery loop may still be draining.
    Unregistered = 2,
    /// The delivery loop has exited.
    Terminated = 3,
}

impl SubscriberState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Registered,
            2 => Self::Unregistered,
            _ => Self::Terminated,
        }
    }
}

struct Inner {
    id: SubscriberId,
    name: String,
    capacity: usize,
    sender: mpsc::Sender<Arc<Message>>,
    /// Taken by the delivery loop on registration.
    inbox: Mutex<Option<mpsc::Receiver<Arc<Message>>>>,
    quit: Shutdown,
    handler: Arc<dyn MessageHandler>,
    state: AtomicU8,
}

/// A consumer with its own bounded inbox.
///
/// This is a cheap handle; clones refer to the same subscriber.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<Inner>,
}

impl Subscriber {
    /// Create a subscriber with the default capacity and a logging handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Create a subscriber with a specific inbox capacity.
    #[must_use]
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self::builder(name).capacity(capacity).build()
    }

    /// Start building a subscriber.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SubscriberBuilder {
        SubscriberBuilder {
            name: name.into(),
            capacity: DEFAULT_INBOX_CAPACITY,
            handler: None,
        }
    }

    /// Get the subscriber ID.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the inbox capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of messages waiting in the inbox.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.capacity - self.inner.sender.capacity()
    }

    /// Get the lifecycle state.
    ///
    /// The state is updated by the delivery loop, membership by the hub's
    /// watcher. When a loop exits on cancellation before its watcher runs,
    /// the state reads `Terminated` while [`Hub::is_subscribed`] still
    /// returns `true`. The watcher removes the subscriber right after.
    ///
    /// [`Hub::is_subscribed`]: crate::Hub::is_subscribed
    #[must_use]
    pub fn state(&self) -> SubscriberState {
        SubscriberState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Check if the subscriber is currently registered with a hub.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state() == SubscriberState::Registered
    }

    /// Take the inbox receiver, moving the subscriber to `Registered`.
    ///
    /// Returns `None` if the subscriber was registered before.
    pub(crate) fn claim(&self) -> Option<mpsc::Receiver<Arc<Message>>> {
        let mut slot = self
            .inner
            .inbox
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let inbox = slot.take()?;
        self.inner
            .state
            .store(SubscriberState::Registered as u8, Ordering::Release);
        Some(inbox)
    }

    /// Move from `Registered` to `Unregistered`; other states are left alone.
    pub(crate) fn mark_unregistered(&self) {
        let _ = self.inner.state.compare_exchange(
            SubscriberState::Registered as u8,
            SubscriberState::Unregistered as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Fire the quit signal. Returns `true` for the first call only.
    pub(crate) fn retire(&self) -> bool {
        self.inner.quit.fire()
    }

    pub(crate) fn quit(&self) -> &Shutdown {
        &self.inner.quit
    }

    /// Try to enqueue a message without waiting.
    ///
    /// Returns `false` if the inbox is full or gone; the message is dropped.
    pub(crate) fn try_deliver(&self, message: Arc<Message>) -> bool {
        match self.inner.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(subscriber = %self.inner.name, id = %self.inner.id, "Inbox full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Delivery loop: drain the inbox until quit or `cancel` fires.
    pub(crate) async fn run(
        self,
        mut inbox: mpsc::Receiver<Arc<Message>>,
        cancel: CancellationToken,
    ) {
        let inner = &self.inner;
        let _exit = LoopExit { inner };
        debug!(subscriber = %inner.name, id = %inner.id, "Delivery loop started");

        loop {
            tokio::select! {
                biased;
                () = inner.quit.fired() => break,
                () = cancel.cancelled() => break,
                message = inbox.recv() => match message {
                    Some(message) => inner.handler.handle(&inner.name, message).await,
                    None => break,
                },
            }
        }

        debug!(
            subscriber = %inner.name,
            id = %inner.id,
            undelivered = inbox.len(),
            "Delivery loop terminated"
        );
    }
}

/// Runs on every delivery loop exit, unwinding out of a handler included.
///
/// Firing quit wakes the hub's watcher, which removes the subscriber.
struct LoopExit<'a> {
    inner: &'a Inner,
}

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        self.inner
            .state
            .store(SubscriberState::Terminated as u8, Ordering::Release);
        self.inner.quit.fire();
        if std::thread::panicking() {
            warn!(subscriber = %self.inner.name, id = %self.inner.id, "Handler panicked, delivery loop stopped");
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Subscriber`].
pub struct SubscriberBuilder {
    name: String,
    capacity: usize,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl SubscriberBuilder {
    /// Set the inbox capacity. Zero is treated as one.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the message handler.
    #[must_use]
    pub fn handler(self, handler: impl MessageHandler) -> Self {
        self.shared_handler(Arc::new(handler))
    }

    /// Set a handler shared with other subscribers.
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the subscriber.
    #[must_use]
    pub fn build(self) -> Subscriber {
        let capacity = self.capacity.max(1);
        let (sender, inbox) = mpsc::channel(capacity);
        Subscriber {
            inner: Arc::new(Inner {
                id: SubscriberId::next(),
                name: self.name,
                capacity,
                sender,
                inbox: Mutex::new(Some(inbox)),
                quit: Shutdown::new(),
                handler: self.handler.unwrap_or_else(|| Arc::new(LogHandler)),
                state: AtomicU8::new(SubscriberState::Created as u8),
            }),
        }
    }
}

impl fmt::Debug for SubscriberBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberBuilder")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
