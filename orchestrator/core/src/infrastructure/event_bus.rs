// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Notification Bus - Topic-keyed Pub/Sub with History Replay
//
// Every payload published to a topic is retained in that topic's history.
// A new subscriber receives the full history, in order, before any live
// payload. Both happen under the same registry lock that `publish` takes,
// so a subscriber observes every publish either entirely through replay or
// entirely as a live delivery: no gap, no duplicate.
//
// Delivery goes through an unbounded channel per subscriber, so publishing
// never waits on a slow consumer and handlers never run under the lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: String,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

struct Topic<T> {
    history: Vec<T>,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<T>)>,
    closed: bool,
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            subscribers: Vec::new(),
            closed: false,
        }
    }
}

/// Process-wide publish/subscribe registry keyed by topic string.
///
/// Cheap to clone; clones share the same registry.
pub struct NotificationBus<T> {
    topics: Arc<Mutex<HashMap<String, Topic<T>>>>,
}

impl<T> Clone for NotificationBus<T> {
    fn clone(&self) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
        }
    }
}

impl<T> Default for NotificationBus<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NotificationBus<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append `payload` to the topic's history and deliver it to every
    /// current subscriber. Returns the number of subscribers reached.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let mut topics = self.topics.lock();
        let entry = topics.entry(topic.to_string()).or_default();

        if entry.closed {
            warn!(topic = %topic, "Publishing to a closed topic; payload kept in history only");
        }

        entry.history.push(payload.clone());
        // Receivers that were dropped without unsubscribing are pruned here
        entry
            .subscribers
            .retain(|(_, sender)| sender.send(payload.clone()).is_ok());

        let delivered = entry.subscribers.len();
        if delivered == 0 {
            debug!(topic = %topic, "No subscribers listening to topic");
        }
        delivered
    }

    /// Subscribe to a topic. The returned subscription yields the topic's
    /// full history first, then live payloads. On a closed topic it yields
    /// the history and then ends.
    pub fn subscribe(&self, topic: &str) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        let mut topics = self.topics.lock();
        let entry = topics.entry(topic.to_string()).or_default();

        for payload in &entry.history {
            // The receiver is still in scope, so this cannot fail
            let _ = sender.send(payload.clone());
        }
        if !entry.closed {
            entry.subscribers.push((id, sender));
        }

        debug!(
            topic = %topic,
            replayed = entry.history.len(),
            "Subscriber registered"
        );

        Subscription {
            handle: SubscriptionHandle {
                topic: topic.to_string(),
                id,
            },
            receiver,
        }
    }

    /// Callback-style subscription: spawns a task on the current tokio
    /// runtime that invokes `handler` for each payload, history first.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use
    /// [`NotificationBus::subscribe_with_on`] from plain threads.
    pub fn subscribe_with<F>(&self, topic: &str, handler: F) -> SubscriptionHandle
    where
        F: FnMut(T) + Send + 'static,
    {
        self.subscribe_with_on(&Handle::current(), topic, handler)
    }

    /// Like [`NotificationBus::subscribe_with`], with the delivery task
    /// spawned on `runtime`.
    pub fn subscribe_with_on<F>(
        &self,
        runtime: &Handle,
        topic: &str,
        mut handler: F,
    ) -> SubscriptionHandle
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut subscription = self.subscribe(topic);
        let handle = subscription.handle().clone();
        runtime.spawn(async move {
            while let Some(payload) = subscription.recv().await {
                handler(payload);
            }
        });
        handle
    }

    /// Remove a registration. Payloads already queued for it are not
    /// retracted. Returns whether the registration existed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut topics = self.topics.lock();
        let Some(entry) = topics.get_mut(&handle.topic) else {
            return false;
        };
        let before = entry.subscribers.len();
        entry.subscribers.retain(|(id, _)| *id != handle.id);
        let removed = entry.subscribers.len() != before;
        if removed {
            debug!(topic = %handle.topic, "Subscriber removed");
        }
        removed
    }

    /// Mark a topic finished: live subscriptions end once they have drained
    /// their queue, and later subscribers get history followed by the end.
    pub fn close(&self, topic: &str) {
        let mut topics = self.topics.lock();
        let entry = topics.entry(topic.to_string()).or_default();
        entry.closed = true;
        entry.subscribers.clear();
    }

    /// Snapshot of everything ever published to `topic`, in publish order.
    pub fn history(&self, topic: &str) -> Vec<T> {
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.history.clone())
            .unwrap_or_default()
    }

    /// Number of live registrations on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |t| t.subscribers.len())
    }
}

/// Receiving side of one registration.
pub struct Subscription<T> {
    handle: SubscriptionHandle,
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }

    pub fn topic(&self) -> &str {
        &self.handle.topic
    }

    /// Receive the next payload; `None` once the registration is gone
    /// (unsubscribed or topic closed) and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Try to receive a payload without blocking
    pub fn try_recv(&mut self) -> Result<T, NotificationBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => NotificationBusError::Empty,
            mpsc::error::TryRecvError::Disconnected => NotificationBusError::Closed,
        })
    }
}

/// Errors that can occur when receiving notifications
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NotificationBusError {
    #[error("Subscription is closed")]
    Closed,

    #[error("No notifications available")]
    Empty,
}
