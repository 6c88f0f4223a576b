//! The egress seam.
//!
//! The teleop node never speaks directly to ROS 2.  It publishes to the
//! internal [`EventBus`][crate::bus::EventBus]; a forwarder listens to the bus
//! and hands each command to a [`Transport`], which translates it into the
//! protocol of the outside world.
//!
//! - [`RosbridgeTransport`][crate::rosbridge::RosbridgeTransport] – JSON over
//!   a rosbridge WebSocket.

use async_trait::async_trait;
use teleop_types::{TeleopError, Twist};

/// Every external-protocol transport must implement this trait.
///
/// # Contract
///
/// * `advertise` is called once before the first `publish` on a topic.
/// * `publish` forwards a single command; it must not wait for the robot to
///   act on it.
/// * `unadvertise` and `close` are called once on shutdown, in that order.
#[async_trait]
pub trait Transport: Send {
    async fn advertise(&mut self, topic: &str) -> Result<(), TeleopError>;

    async fn publish(&mut self, topic: &str, twist: &Twist) -> Result<(), TeleopError>;

    async fn unadvertise(&mut self, topic: &str) -> Result<(), TeleopError>;

    async fn close(&mut self) -> Result<(), TeleopError>;
}
