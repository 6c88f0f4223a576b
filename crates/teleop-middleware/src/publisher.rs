//! Publisher handle bound to a single topic.

use teleop_types::{Event, EventPayload, TeleopError, Twist};
use tracing::trace;

use crate::bus::EventBus;

/// Fire-and-forget publisher for velocity commands on one topic.
///
/// Obtained from the runtime context; every message is stamped with the
/// owning node's name as its event source.
#[derive(Clone, Debug)]
pub struct Publisher {
    topic: String,
    source: String,
    bus: EventBus,
}

impl Publisher {
    pub fn new(bus: EventBus, topic: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            source: source.into(),
            bus,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hand `twist` to the bus.  Returns how many subscribers received it.
    pub fn publish(&self, twist: Twist) -> Result<usize, TeleopError> {
        let event = Event::new(self.source.as_str(), EventPayload::Twist(twist));
        let delivered = self.bus.publish_to(&self.topic, event)?;
        trace!(topic = %self.topic, delivered, "published Twist");
        Ok(delivered)
    }
}
