//! `teleop-middleware` – the pub/sub plumbing between the teleop node and the
//! robot.
//!
//! # Modules
//!
//! - [`bus`] – named-topic publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`publisher`] – fire-and-forget [`Publisher`] handle bound to one topic.
//! - [`shutdown`] – cooperative [`ShutdownSignal`] shared across tasks and
//!   threads.
//! - [`transport`] – the [`Transport`] trait every egress protocol implements.
//! - [`rosbridge`] – rosbridge WebSocket transport and the forwarder that
//!   relays a bus topic through it.

pub mod bus;
pub mod publisher;
pub mod rosbridge;
pub mod shutdown;
pub mod transport;

pub use bus::{EventBus, TopicReceiver};
pub use publisher::Publisher;
pub use rosbridge::{RosbridgeForwarder, RosbridgeTransport};
pub use shutdown::ShutdownSignal;
pub use transport::Transport;
