//! rosbridge egress.
//!
//! [`RosbridgeTransport`] speaks the rosbridge v2 JSON protocol over a
//! WebSocket, so that commands published on the internal bus reach a real
//! ROS 2 graph (e.g. turtlesim behind `rosbridge_server`).
//!
//! [`RosbridgeForwarder`] subscribes to one bus topic and relays every
//! [`Twist`] on it through a [`Transport`]:
//!
//! 1. `advertise` the topic as `geometry_msgs/msg/Twist`,
//! 2. `publish` each command as it arrives,
//! 3. `unadvertise` and close once shutdown is requested.

use async_trait::async_trait;
use futures_util::SinkExt;
use serde_json::{Value, json};
use teleop_types::{EventPayload, TeleopError, Twist};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, instrument, warn};

use crate::bus::TopicReceiver;
use crate::shutdown::ShutdownSignal;
use crate::transport::Transport;

/// ROS 2 message type advertised for velocity commands.
pub const TWIST_TYPE: &str = "geometry_msgs/msg/Twist";

/// Default rosbridge_server endpoint.
pub const DEFAULT_ROSBRIDGE_URL: &str = "ws://localhost:9090";

/// `advertise` op announcing `topic` as a Twist publisher.
pub fn advertise_frame(topic: &str) -> Value {
    json!({
        "op": "advertise",
        "topic": topic,
        "type": TWIST_TYPE,
    })
}

/// `publish` op carrying one Twist.
pub fn publish_frame(topic: &str, twist: &Twist) -> Value {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "linear":  { "x": twist.linear.x,  "y": twist.linear.y,  "z": twist.linear.z },
            "angular": { "x": twist.angular.x, "y": twist.angular.y, "z": twist.angular.z }
        }
    })
}

/// `unadvertise` op retracting `topic`.
pub fn unadvertise_frame(topic: &str) -> Value {
    json!({
        "op": "unadvertise",
        "topic": topic,
    })
}

/// WebSocket client for a rosbridge_server.
pub struct RosbridgeTransport {
    url: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RosbridgeTransport {
    /// Open a WebSocket to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] if the handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TeleopError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TeleopError::Transport(format!("rosbridge connect to {url}: {e}")))?;
        info!(url = %url, "connected to rosbridge");
        Ok(Self {
            url: url.to_string(),
            ws,
        })
    }

    async fn send_frame(&mut self, frame: Value) -> Result<(), TeleopError> {
        self.ws
            .send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| TeleopError::Transport(format!("rosbridge send to {}: {e}", self.url)))
    }
}

#[async_trait]
impl Transport for RosbridgeTransport {
    async fn advertise(&mut self, topic: &str) -> Result<(), TeleopError> {
        self.send_frame(advertise_frame(topic)).await
    }

    async fn publish(&mut self, topic: &str, twist: &Twist) -> Result<(), TeleopError> {
        self.send_frame(publish_frame(topic, twist)).await
    }

    async fn unadvertise(&mut self, topic: &str) -> Result<(), TeleopError> {
        self.send_frame(unadvertise_frame(topic)).await
    }

    async fn close(&mut self) -> Result<(), TeleopError> {
        self.ws
            .close(None)
            .await
            .map_err(|e| TeleopError::Transport(format!("rosbridge close: {e}")))
    }
}

/// Relays every command on one bus topic through a [`Transport`].
pub struct RosbridgeForwarder<T: Transport> {
    receiver: TopicReceiver,
    transport: T,
}

impl<T: Transport> RosbridgeForwarder<T> {
    pub fn new(receiver: TopicReceiver, transport: T) -> Self {
        Self {
            receiver,
            transport,
        }
    }

    /// Forward until `shutdown` is requested or the bus closes.
    ///
    /// Commands still buffered when shutdown is requested are dropped.  A
    /// failed send ends forwarding; there are no retries.
    #[instrument(name = "forwarder", skip_all, fields(topic = %self.receiver.topic()))]
    pub async fn run(mut self, shutdown: ShutdownSignal) -> Result<(), TeleopError> {
        let topic = self.receiver.topic().to_string();
        self.transport.advertise(&topic).await?;
        debug!(topic = %topic, "advertised");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                result = self.receiver.recv() => match result {
                    Ok(event) => {
                        let EventPayload::Twist(twist) = event.payload;
                        if let Err(e) = self.transport.publish(&topic, &twist).await {
                            warn!(topic = %topic, error = %e, "forwarding stopped");
                            return Err(e);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(topic = %topic, lagged_by = n, "forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        // Close even when unadvertise fails; the first error wins.
        let unadvertised = self.transport.unadvertise(&topic).await;
        let closed = self.transport.close().await;
        unadvertised.and(closed)?;
        debug!(topic = %topic, "forwarder stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::publisher::Publisher;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every frame it would have sent.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        frames: Arc<Mutex<Vec<Value>>>,
        fail_publish: bool,
        fail_unadvertise: bool,
    }

    impl RecordingTransport {
        fn frames(&self) -> Vec<Value> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn advertise(&mut self, topic: &str) -> Result<(), TeleopError> {
            self.frames.lock().unwrap().push(advertise_frame(topic));
            Ok(())
        }

        async fn publish(&mut self, topic: &str, twist: &Twist) -> Result<(), TeleopError> {
            if self.fail_publish {
                return Err(TeleopError::Transport("broken pipe".to_string()));
            }
            self.frames.lock().unwrap().push(publish_frame(topic, twist));
            Ok(())
        }

        async fn unadvertise(&mut self, topic: &str) -> Result<(), TeleopError> {
            if self.fail_unadvertise {
                return Err(TeleopError::Transport("socket reset".to_string()));
            }
            self.frames.lock().unwrap().push(unadvertise_frame(topic));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TeleopError> {
            self.frames.lock().unwrap().push(json!({ "op": "close" }));
            Ok(())
        }
    }

    async fn wait_for_frames(transport: &RecordingTransport, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.frames().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("forwarder did not produce the expected frames in time");
    }

    #[test]
    fn advertise_frame_names_twist_type() {
        let frame = advertise_frame("/turtle1/cmd_vel");
        assert_eq!(frame["op"], "advertise");
        assert_eq!(frame["topic"], "/turtle1/cmd_vel");
        assert_eq!(frame["type"], "geometry_msgs/msg/Twist");
    }

    #[test]
    fn publish_frame_carries_full_twist() {
        let frame = publish_frame("/turtle1/cmd_vel", &Twist::planar(1.0, 0.5));
        assert_eq!(frame["op"], "publish");
        assert_eq!(frame["msg"]["linear"]["x"], 1.0);
        assert_eq!(frame["msg"]["linear"]["y"], 0.0);
        assert_eq!(frame["msg"]["angular"]["z"], 0.5);
        assert_eq!(frame["msg"]["angular"]["x"], 0.0);
    }

    #[test]
    fn unadvertise_frame_has_no_type() {
        let frame = unadvertise_frame("/turtle1/cmd_vel");
        assert_eq!(frame["op"], "unadvertise");
        assert!(frame.get("type").is_none());
    }

    #[tokio::test]
    async fn forwards_commands_between_advertise_and_unadvertise()
    -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let receiver = bus.subscribe_to("/turtle1/cmd_vel")?;
        let transport = RecordingTransport::default();
        let shutdown = ShutdownSignal::new();

        let forwarder = RosbridgeForwarder::new(receiver, transport.clone());
        let handle = tokio::spawn(forwarder.run(shutdown.clone()));

        let publisher = Publisher::new(bus.clone(), "/turtle1/cmd_vel", "test");
        publisher.publish(Twist::planar(0.5, 0.0))?;
        publisher.publish(Twist::planar(1.0, -0.5))?;
        wait_for_frames(&transport, 3).await;

        shutdown.request();
        handle.await??;

        let frames = transport.frames();
        let ops: Vec<&str> = frames.iter().map(|f| f["op"].as_str().unwrap()).collect();
        assert_eq!(ops, ["advertise", "publish", "publish", "unadvertise", "close"]);
        assert_eq!(frames[2]["msg"]["linear"]["x"], 1.0);
        assert_eq!(frames[2]["msg"]["angular"]["z"], -0.5);
        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_ends_forwarding() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let receiver = bus.subscribe_to("/turtle1/cmd_vel")?;
        let transport = RecordingTransport {
            fail_publish: true,
            ..RecordingTransport::default()
        };

        let handle = tokio::spawn(
            RosbridgeForwarder::new(receiver, transport.clone()).run(ShutdownSignal::new()),
        );
        wait_for_frames(&transport, 1).await;
        Publisher::new(bus.clone(), "/turtle1/cmd_vel", "test").publish(Twist::default())?;

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await??;
        assert!(matches!(result, Err(TeleopError::Transport(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_unadvertise_still_closes_the_socket()
    -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let receiver = bus.subscribe_to("/turtle1/cmd_vel")?;
        let transport = RecordingTransport {
            fail_unadvertise: true,
            ..RecordingTransport::default()
        };
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        let result = RosbridgeForwarder::new(receiver, transport.clone()).run(shutdown).await;

        assert!(matches!(result, Err(TeleopError::Transport(msg)) if msg == "socket reset"));
        let ops: Vec<Value> = transport.frames().iter().map(|f| f["op"].clone()).collect();
        assert_eq!(ops, [json!("advertise"), json!("close")]);
        Ok(())
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_a_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let result = RosbridgeTransport::connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(TeleopError::Transport(_))));
    }
}
