use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Three-component vector, laid out like `geometry_msgs/msg/Vector3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Velocity command, laid out like `geometry_msgs/msg/Twist`.
///
/// A planar robot only ever reads `linear.x` (forward speed) and `angular.z`
/// (yaw rate); everything else stays zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Twist {
    /// Build a planar command with only `linear.x` and `angular.z` set.
    pub fn planar(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear: Vector3 {
                x: linear_x,
                ..Vector3::default()
            },
            angular: Vector3 {
                z: angular_z,
                ..Vector3::default()
            },
        }
    }
}

/// The two accumulated scalars driving the published command.
///
/// Values are not clamped: repeated increments keep growing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityState {
    pub linear: f64,
    pub angular: f64,
}

impl VelocityState {
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    /// Command message for the current state.
    pub fn to_twist(self) -> Twist {
        Twist::planar(self.linear, self.angular)
    }
}

/// Unified event wrapper for the pub/sub bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Name of the publishing node, e.g. "turtle_controller_turtle1".
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a new event with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A velocity command.
    Twist(Twist),
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum TeleopError {
    #[error("Usage: {0}")]
    Usage(String),

    #[error("Terminal Error: {0}")]
    Terminal(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Runtime Error: {0}")]
    Runtime(String),
}
