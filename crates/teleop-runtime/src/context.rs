//! [`Context`] – explicit runtime handle.
//!
//! Owns the event bus and the shutdown signal, hands out publishers, and
//! drives a [`Tick`] implementation at a fixed period until shutdown is
//! requested.  Nothing here is global: the context is created once in `main`,
//! passed to the nodes that need it, and torn down explicitly.

use std::time::Duration;

use teleop_middleware::{EventBus, Publisher, ShutdownSignal, TopicReceiver, bus::DEFAULT_CAPACITY};
use teleop_types::TeleopError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

/// Something the runtime invokes once per period.
pub trait Tick {
    /// Run one iteration.  An error ends the spin loop.
    fn tick(&mut self) -> Result<(), TeleopError>;
}

/// Construction parameters for a [`Context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Per-topic queue depth on the bus.
    pub queue_depth: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_CAPACITY,
        }
    }
}

pub struct Context {
    bus: EventBus,
    shutdown: ShutdownSignal,
}

impl Context {
    /// Initialise a runtime with a fresh shutdown signal.
    pub fn init(options: ContextOptions) -> Self {
        Self::with_shutdown(options, ShutdownSignal::new())
    }

    /// Initialise a runtime around an existing shutdown signal, e.g. one a
    /// signal handler was already wired to.
    pub fn with_shutdown(options: ContextOptions, shutdown: ShutdownSignal) -> Self {
        let bus = EventBus::new(options.queue_depth);
        info!(queue_depth = bus.capacity(), "runtime initialised");
        Self { bus, shutdown }
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Request shutdown; the spin loop stops before its next tick.
    pub fn shutdown(&self) {
        self.shutdown.request();
    }

    /// Publisher bound to `topic`, stamping events with `node_name`.
    pub fn create_publisher(&self, topic: &str, node_name: &str) -> Publisher {
        debug!(topic = %topic, node = %node_name, "publisher created");
        Publisher::new(self.bus(), topic, node_name)
    }

    pub fn subscribe(&self, topic: &str) -> Result<TopicReceiver, TeleopError> {
        self.bus.subscribe_to(topic)
    }

    /// Invoke `node.tick()` every `period` until shutdown is requested.
    ///
    /// Shutdown is checked before every tick, so a node that requests
    /// shutdown from inside `tick` is never invoked again.  An external
    /// request (signal handler) interrupts the wait for the next period.
    ///
    /// Returns the number of completed ticks.  A tick error requests
    /// shutdown and is returned as-is.
    #[instrument(name = "spin", skip_all, fields(period_ms = period.as_millis() as u64))]
    pub async fn spin<N: Tick>(&self, node: &mut N, period: Duration) -> Result<u64, TeleopError> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        while !self.shutdown.is_requested() {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                _ = interval.tick() => {}
            }
            if let Err(e) = node.tick() {
                self.shutdown.request();
                return Err(e);
            }
            ticks += 1;
        }

        debug!(ticks, "spin finished");
        Ok(ticks)
    }

    /// Explicit teardown.  Idempotent with respect to earlier shutdown
    /// requests.
    pub fn teardown(self) {
        self.shutdown.request();
        info!("runtime shut down");
    }
}
