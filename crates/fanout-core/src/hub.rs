//! The Fanout hub.
//!
//! The hub owns the membership set and fans published messages out to every
//! member. Membership changes and publishes are serialized by one lock that
//! is only ever held for non-suspending work.

use crate::message::Message;
use crate::subscriber::{Subscriber, SubscriberId, SubscriberState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The subscriber is already registered with a hub.
    #[error("Subscriber already registered: {0}")]
    AlreadySubscribed(String),

    /// The subscriber was unsubscribed or cancelled and cannot be reused.
    #[error("Subscriber has been retired: {0}")]
    Retired(String),

    /// The hub has been shut down.
    #[error("Hub is shut down")]
    Closed,

    /// No Tokio runtime to run the subscriber's tasks on.
    #[error("No Tokio runtime available")]
    NoRuntime,
}

type MemberMap = HashMap<SubscriberId, Subscriber>;
type Members = Arc<Mutex<MemberMap>>;

fn lock(members: &Mutex<MemberMap>) -> MutexGuard<'_, MemberMap> {
    // Every critical section leaves the map consistent, so a poisoned lock is still usable.
    members.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// The central pub/sub hub.
///
/// Every subscription runs two tasks tracked by the hub: the subscriber's
/// delivery loop and a watcher that removes the subscriber when its
/// cancellation token fires.
#[derive(Debug)]
pub struct Hub {
    /// Registered subscribers indexed by ID.
    members: Members,
    /// Delivery loops and cancellation watchers.
    tasks: TaskTracker,
    counters: Counters,
}

impl Hub {
    /// Create a new hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Arc::new(Mutex::new(HashMap::new())),
            tasks: TaskTracker::new(),
            counters: Counters::default(),
        }
    }

    /// Register a subscriber and start its delivery loop.
    ///
    /// The subscription ends on [`Hub::unsubscribe`] or when `cancel` fires,
    /// whichever comes first. Subscribers are single-use.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber was registered before, if the hub
    /// was shut down, or if there is no Tokio runtime in the current context.
    pub fn subscribe(
        &self,
        cancel: CancellationToken,
        subscriber: &Subscriber,
    ) -> Result<(), HubError> {
        let runtime = Handle::try_current().map_err(|_| HubError::NoRuntime)?;

        let mut members = lock(&self.members);
        if self.tasks.is_closed() {
            return Err(HubError::Closed);
        }
        match subscriber.state() {
            SubscriberState::Created => {}
            SubscriberState::Registered => {
                return Err(HubError::AlreadySubscribed(subscriber.name().to_string()))
            }
            SubscriberState::Unregistered | SubscriberState::Terminated => {
                return Err(HubError::Retired(subscriber.name().to_string()))
            }
        }
        let inbox = subscriber
            .claim()
            .ok_or_else(|| HubError::AlreadySubscribed(subscriber.name().to_string()))?;

        members.insert(subscriber.id(), subscriber.clone());

        // Spawned under the lock so `shutdown` never misses a task.
        self.tasks
            .spawn_on(subscriber.clone().run(inbox, cancel.clone()), &runtime);
        self.tasks.spawn_on(
            watch_cancellation(Arc::clone(&self.members), subscriber.clone(), cancel),
            &runtime,
        );

        debug!(
            subscriber = %subscriber.name(),
            id = %subscriber.id(),
            subscribers = members.len(),
            "Subscribed"
        );

        Ok(())
    }

    /// Remove a subscriber and stop its delivery loop.
    ///
    /// Returns `true` if the subscriber was a member. Unsubscribing an absent
    /// subscriber is a no-op.
    pub fn unsubscribe(&self, subscriber: &Subscriber) -> bool {
        let removed = {
            let mut members = lock(&self.members);
            let removed = members.remove(&subscriber.id()).is_some();
            if removed {
                subscriber.mark_unregistered();
                debug!(
                    subscriber = %subscriber.name(),
                    id = %subscriber.id(),
                    subscribers = members.len(),
                    "Unsubscribed"
                );
            }
            removed
        };

        if removed {
            subscriber.retire();
        }
        removed
    }

    /// Publish a message to every registered subscriber.
    ///
    /// Returns the number of subscribers whose inbox accepted the message.
    /// Subscribers with a full inbox miss it.
    pub fn publish(&self, message: impl Into<Message>) -> usize {
        self.publish_shared(Arc::new(message.into()))
    }

    /// Publish an already shared message.
    pub fn publish_shared(&self, message: Arc<Message>) -> usize {
        self.publish_outcome(message).delivered
    }

    /// Publish an already shared message and report how the fan-out went.
    ///
    /// Both counts come from the same membership snapshot.
    pub fn publish_outcome(&self, message: Arc<Message>) -> PublishOutcome {
        let (delivered, recipients) = {
            let members = lock(&self.members);
            let delivered = members
                .values()
                .filter(|s| s.try_deliver(Arc::clone(&message)))
                .count();
            (delivered, members.len())
        };
        let dropped = recipients - delivered;

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);

        trace!(
            recipients = delivered,
            dropped,
            bytes = message.payload_size(),
            "Published message"
        );
        PublishOutcome { delivered, dropped }
    }

    /// Get the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.members).len()
    }

    /// Check if a subscriber is registered with this hub.
    #[must_use]
    pub fn is_subscribed(&self, subscriber: &Subscriber) -> bool {
        lock(&self.members).contains_key(&subscriber.id())
    }

    /// Number of delivery loops and watchers still running.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            active_tasks: self.active_tasks(),
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Unsubscribe everyone and wait for every background task to exit.
    ///
    /// Later calls to [`Hub::subscribe`] fail with [`HubError::Closed`].
    pub async fn shutdown(&self) {
        let retired: Vec<Subscriber> = {
            let mut members = lock(&self.members);
            self.tasks.close();
            members
                .drain()
                .map(|(_, subscriber)| {
                    subscriber.mark_unregistered();
                    subscriber
                })
                .collect()
        };

        for subscriber in &retired {
            subscriber.retire();
        }

        self.tasks.wait().await;
        info!(unsubscribed = retired.len(), "Hub shut down");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        // Stop tasks of subscribers that outlive the hub.
        let members = lock(&self.members);
        for subscriber in members.values() {
            subscriber.mark_unregistered();
            subscriber.retire();
        }
    }
}

/// Result of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// Inboxes that accepted the message.
    pub delivered: usize,
    /// Members that missed it.
    pub dropped: usize,
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Number of registered subscribers.
    pub subscribers: usize,
    /// Number of background tasks still running.
    pub active_tasks: usize,
    /// Total publish calls.
    pub published: u64,
    /// Total successful enqueues.
    pub delivered: u64,
    /// Total messages dropped on full inboxes.
    pub dropped: u64,
}

/// Remove `subscriber` from `members` when its subscription ends.
///
/// Waits for `cancel` or the subscriber's quit signal. Quit fires on
/// `Hub::unsubscribe` (already removed) and whenever the delivery loop exits
/// on its own, so removal here is idempotent.
async fn watch_cancellation(members: Members, subscriber: Subscriber, cancel: CancellationToken) {
    let cancelled = tokio::select! {
        () = subscriber.quit().fired() => false,
        () = cancel.cancelled() => true,
    };

    let (removed, remaining) = {
        let mut members = lock(&members);
        let removed = members.remove(&subscriber.id()).is_some();
        if removed {
            subscriber.mark_unregistered();
        }
        (removed, members.len())
    };
    subscriber.retire();

    if removed {
        debug!(
            subscriber = %subscriber.name(),
            id = %subscriber.id(),
            subscribers = remaining,
            cancelled,
            "Subscription ended"
        );
    }
}
