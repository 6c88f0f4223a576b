//! Named-topic publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Topics are plain strings such as `/turtle1/cmd_vel`.  A topic's channel is
//! created the first time anyone publishes to or subscribes to it, with the
//! bus-wide capacity (the queue depth).  When a subscriber falls more than
//! `capacity` messages behind, the oldest messages are dropped for it and it
//! observes a `Lagged` error on its next receive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use teleop_types::{Event, TeleopError};
use tokio::sync::broadcast;

/// Default queue depth per topic, same as the history depth of a default
/// ROS 2 publisher.
pub const DEFAULT_CAPACITY: usize = 10;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// topic table.
#[derive(Clone, Debug)]
pub struct EventBus {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Event>>>>,
}

impl EventBus {
    /// Create a new bus with the given per-topic channel capacity.
    ///
    /// A capacity of zero is bumped to one; broadcast channels cannot be
    /// empty.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Per-topic channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when nobody is currently listening on the topic; this
    /// is a normal condition for a fire-and-forget publisher, not an error.
    pub fn publish_to(&self, topic: &str, event: Event) -> Result<usize, TeleopError> {
        let sender = self.topic_sender(topic)?;
        match sender.send(event) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => Ok(0),
        }
    }

    /// Subscribe to `topic`.
    ///
    /// The returned [`TopicReceiver`] yields only events published to that
    /// topic after this call.
    pub fn subscribe_to(&self, topic: &str) -> Result<TopicReceiver, TeleopError> {
        Ok(TopicReceiver {
            topic: topic.to_string(),
            receiver: self.topic_sender(topic)?.subscribe(),
        })
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .map(|topics| topics.get(topic).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }

    fn topic_sender(&self, topic: &str) -> Result<broadcast::Sender<Event>, TeleopError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| TeleopError::Channel(format!("topic table poisoned: {e}")))?;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single topic.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The topic this receiver is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
