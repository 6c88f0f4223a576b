//! Keyboard teleoperation node.
//!
//! Every tick the node polls for at most one keystroke, folds it into the
//! persistent [`VelocityState`], and publishes the resulting [`Twist`] on
//! `/<turtle>/cmd_vel`.  The key → effect mapping is a pure function
//! ([`KeyEffect::from_key`] + [`apply_effect`]) so it can be exercised without
//! a terminal or a bus.
//!
//! | key | effect |
//! |---|---|
//! | `w` / `s` | linear ± [`LINEAR_STEP`] |
//! | `a` / `d` | angular ± [`ANGULAR_STEP`] |
//! | `x` | stop (both to zero) |
//! | `h` | log the help banner |
//! | `q` | request shutdown; nothing is published on that tick |

use std::time::Duration;

use teleop_middleware::{Publisher, ShutdownSignal};
use teleop_types::{TeleopError, Twist, VelocityState};
use tracing::{info, instrument};

use crate::context::{Context, Tick};
use crate::keys::KeySource;

pub const HELP: &str = "
Controls:
  w/s: linear +/-    a/d: angular +/-
  x  : stop          h  : help
  q  : quit
";

/// Publish cadence: 20 Hz.
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

pub const LINEAR_STEP: f64 = 0.5;
pub const ANGULAR_STEP: f64 = 0.5;

/// What a recognised keystroke does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEffect {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
    Help,
    Quit,
}

impl KeyEffect {
    /// Map a keystroke to its effect; unrecognised keys map to `None`.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'w' => Some(Self::Forward),
            's' => Some(Self::Backward),
            'a' => Some(Self::TurnLeft),
            'd' => Some(Self::TurnRight),
            'x' => Some(Self::Stop),
            'h' => Some(Self::Help),
            'q' => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Pure state transition.  `Help` and `Quit` leave the state untouched.
pub fn apply_effect(state: VelocityState, effect: KeyEffect) -> VelocityState {
    match effect {
        KeyEffect::Forward => VelocityState::new(state.linear + LINEAR_STEP, state.angular),
        KeyEffect::Backward => VelocityState::new(state.linear - LINEAR_STEP, state.angular),
        KeyEffect::TurnLeft => VelocityState::new(state.linear, state.angular + ANGULAR_STEP),
        KeyEffect::TurnRight => VelocityState::new(state.linear, state.angular - ANGULAR_STEP),
        KeyEffect::Stop => VelocityState::default(),
        KeyEffect::Help | KeyEffect::Quit => state,
    }
}

/// Topic a turtle listens on for velocity commands.
pub fn cmd_vel_topic(turtle_name: &str) -> String {
    format!("/{turtle_name}/cmd_vel")
}

pub fn node_name(turtle_name: &str) -> String {
    format!("turtle_controller_{turtle_name}")
}

pub struct TeleopNode<K: KeySource> {
    name: String,
    publisher: Publisher,
    keys: K,
    state: VelocityState,
    shutdown: ShutdownSignal,
}

impl<K: KeySource> TeleopNode<K> {
    /// Bind a publisher to `/<turtle_name>/cmd_vel` and announce the
    /// controls.
    pub fn new(ctx: &Context, turtle_name: &str, keys: K) -> Self {
        let name = node_name(turtle_name);
        let topic = cmd_vel_topic(turtle_name);
        let publisher = ctx.create_publisher(&topic, &name);

        info!(node = %name, "Publishing Twist to {topic}");
        info!("{HELP}");

        Self {
            name,
            publisher,
            keys,
            state: VelocityState::default(),
            shutdown: ctx.shutdown_signal(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        self.publisher.topic()
    }

    pub fn state(&self) -> VelocityState {
        self.state
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// Command for the current state.
    pub fn command(&self) -> Twist {
        self.state.to_twist()
    }
}

impl<K: KeySource> Tick for TeleopNode<K> {
    #[instrument(level = "debug", name = "tick", skip_all, fields(node = %self.name))]
    fn tick(&mut self) -> Result<(), TeleopError> {
        if let Some(key) = self.keys.poll_key()? {
            match KeyEffect::from_key(key) {
                Some(KeyEffect::Quit) => {
                    info!(node = %self.name, "quit requested");
                    self.shutdown.request();
                    return Ok(());
                }
                Some(KeyEffect::Help) => info!("{HELP}"),
                Some(effect) => {
                    self.state = apply_effect(self.state, effect);
                    info!("lin={:.2} ang={:.2}", self.state.linear, self.state.angular);
                }
                None => {}
            }
        }

        self.publisher.publish(self.command())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;
    use crate::keys::ScriptedKeys;
    use teleop_types::EventPayload;

    fn fold(keys: &str) -> VelocityState {
        keys.chars()
            .filter_map(KeyEffect::from_key)
            .fold(VelocityState::default(), apply_effect)
    }

    #[test]
    fn key_table() {
        assert_eq!(KeyEffect::from_key('w'), Some(KeyEffect::Forward));
        assert_eq!(KeyEffect::from_key('s'), Some(KeyEffect::Backward));
        assert_eq!(KeyEffect::from_key('a'), Some(KeyEffect::TurnLeft));
        assert_eq!(KeyEffect::from_key('d'), Some(KeyEffect::TurnRight));
        assert_eq!(KeyEffect::from_key('x'), Some(KeyEffect::Stop));
        assert_eq!(KeyEffect::from_key('h'), Some(KeyEffect::Help));
        assert_eq!(KeyEffect::from_key('q'), Some(KeyEffect::Quit));
        assert_eq!(KeyEffect::from_key('W'), None);
        assert_eq!(KeyEffect::from_key(' '), None);
    }

    #[test]
    fn w_w_a_accumulates() {
        assert_eq!(fold("wwa"), VelocityState::new(1.0, 0.5));
    }

    #[test]
    fn same_axis_increments_commute() {
        assert_eq!(fold("wsw"), fold("wws"));
        assert_eq!(fold("adad"), fold("aadd"));
        assert_eq!(fold("wadw"), VelocityState::new(1.0, 0.0));
    }

    #[test]
    fn stop_resets_both_axes_exactly() {
        let state = apply_effect(VelocityState::new(2.0, 2.0), KeyEffect::Stop);
        assert_eq!(state, VelocityState::new(0.0, 0.0));
        assert_eq!(fold("wwwaaxs"), VelocityState::new(-0.5, 0.0));
    }

    #[test]
    fn velocities_are_not_clamped() {
        let keys = "w".repeat(100);
        assert_eq!(fold(&keys).linear, 50.0);
        assert_eq!(fold(&"d".repeat(40)).angular, -20.0);
    }

    #[test]
    fn help_and_quit_leave_state_alone() {
        let state = VelocityState::new(1.5, -0.5);
        assert_eq!(apply_effect(state, KeyEffect::Help), state);
        assert_eq!(apply_effect(state, KeyEffect::Quit), state);
    }

    #[test]
    fn topic_and_node_names_follow_turtle() {
        assert_eq!(cmd_vel_topic("turtle1"), "/turtle1/cmd_vel");
        assert_eq!(node_name("turtle1"), "turtle_controller_turtle1");
    }

    #[tokio::test]
    async fn tick_publishes_current_command() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = Context::init(ContextOptions::default());
        let mut rx = ctx.subscribe("/turtle1/cmd_vel")?;
        let mut node = TeleopNode::new(&ctx, "turtle1", ScriptedKeys::from_keys("wwa"));
        assert_eq!(node.name(), "turtle_controller_turtle1");
        assert_eq!(node.topic(), "/turtle1/cmd_vel");

        for _ in 0..3 {
            node.tick()?;
        }
        assert_eq!(node.state(), VelocityState::new(1.0, 0.5));

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.source, "turtle_controller_turtle1");
            let EventPayload::Twist(twist) = event.payload;
            last = Some(twist);
        }
        let twist = last.ok_or("nothing published")?;
        assert_eq!(twist.linear.x, 1.0);
        assert_eq!(twist.angular.z, 0.5);
        assert_eq!((twist.linear.y, twist.linear.z), (0.0, 0.0));
        assert_eq!((twist.angular.x, twist.angular.y), (0.0, 0.0));
        Ok(())
    }

    #[tokio::test]
    async fn idle_ticks_republish_the_same_command() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = Context::init(ContextOptions::default());
        let mut rx = ctx.subscribe("/turtle1/cmd_vel")?;
        let mut node = TeleopNode::new(&ctx, "turtle1", ScriptedKeys::new([Some('w'), None, None]));

        for _ in 0..3 {
            node.tick()?;
        }

        let commands: Vec<Twist> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| {
                let EventPayload::Twist(twist) = event.payload;
                twist
            })
            .collect();
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| *c == Twist::planar(0.5, 0.0)));
        Ok(())
    }

    #[tokio::test]
    async fn unrecognised_and_help_keys_publish_unchanged_state()
    -> Result<(), Box<dyn std::error::Error>> {
        let ctx = Context::init(ContextOptions::default());
        let mut rx = ctx.subscribe("/turtle1/cmd_vel")?;
        let mut node = TeleopNode::new(&ctx, "turtle1", ScriptedKeys::from_keys("zh"));

        node.tick()?;
        node.tick()?;

        assert_eq!(node.state(), VelocityState::default());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(!ctx.is_shutdown());
        Ok(())
    }

    #[tokio::test]
    async fn quit_skips_publish_and_requests_shutdown() -> Result<(), Box<dyn std::error::Error>> {
        let ctx = Context::init(ContextOptions::default());
        let mut rx = ctx.subscribe("/turtle1/cmd_vel")?;
        let mut node = TeleopNode::new(&ctx, "turtle1", ScriptedKeys::from_keys("q"));

        node.tick()?;

        assert!(ctx.is_shutdown());
        assert!(rx.try_recv().is_err(), "quit tick must not publish");
        Ok(())
    }
}
