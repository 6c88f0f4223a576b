//! `turtle_controller` – keyboard teleoperation for a turtlesim turtle.
//!
//! ```text
//! turtle_controller <turtle_name>
//! ```
//!
//! 1. Puts the terminal into raw mode for the whole session.
//! 2. Publishes a `Twist` on `/<turtle_name>/cmd_vel` at 20 Hz, steered with
//!    `w`/`s`/`a`/`d`, stopped with `x`, ended with `q`.
//! 3. Relays every command to rosbridge (`~/.turtle_teleop/config.toml`,
//!    `TELEOP_*` env vars) when one is reachable.
//! 4. Treats SIGINT/SIGTERM like `q`.

mod config;

use std::time::Duration;

use colored::Colorize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use teleop_middleware::{RosbridgeForwarder, RosbridgeTransport, ShutdownSignal};
use teleop_runtime::{
    Context, ContextOptions, RawModeGuard, TICK_PERIOD, TeleopNode, TerminalKeys, init_tracing,
};
use teleop_types::TeleopError;

const USAGE: &str = "turtle_controller <turtle_name>";

const ROSBRIDGE_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const FORWARDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() {
    let turtle_name = match target_from_args(std::env::args()) {
        Ok(name) => name,
        Err(TeleopError::Usage(usage)) => {
            println!("{} {}", "Usage:".bold(), usage);
            return;
        }
        Err(e) => {
            println!("{e}");
            return;
        }
    };

    let cfg = config::load().unwrap_or_else(|e| {
        eprintln!("{}: {}", "Config error".red(), e);
        eprintln!("  Using default configuration.");
        let mut cfg = config::Config::default();
        config::apply_env_overrides(&mut cfg);
        cfg
    });

    let telemetry = init_tracing("turtle-teleop");
    let result = run(&turtle_name, &cfg);
    drop(telemetry);

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// The turtle name is the first positional argument; anything after it is
/// ignored.
fn target_from_args(mut args: impl Iterator<Item = String>) -> Result<String, TeleopError> {
    args.nth(1).ok_or_else(|| TeleopError::Usage(USAGE.to_string()))
}

fn run(turtle_name: &str, cfg: &config::Config) -> Result<(), TeleopError> {
    // Dropped last, after the runtime and every task on it.
    let _terminal = RawModeGuard::acquire()?;

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || signal.request()) {
        warn!(
            error = %e,
            "failed to install signal handler; SIGTERM will not stop the controller cleanly"
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TeleopError::Runtime(format!("failed to build tokio runtime: {e}")))?;

    runtime.block_on(async {
        let ctx = Context::with_shutdown(
            ContextOptions {
                queue_depth: cfg.queue_depth,
            },
            shutdown,
        );
        let mut node = TeleopNode::new(&ctx, turtle_name, TerminalKeys::new(ctx.shutdown_signal()));

        let forwarder = if cfg.rosbridge_enabled {
            spawn_forwarder(&ctx, node.topic(), &cfg.rosbridge_url).await
        } else {
            None
        };

        let result = ctx.spin(&mut node, TICK_PERIOD).await;
        ctx.teardown();

        if let Some(handle) = forwarder {
            match tokio::time::timeout(FORWARDER_DRAIN_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "rosbridge forwarder failed"),
                Ok(Err(e)) => warn!(error = %e, "rosbridge forwarder panicked"),
                Err(_) => warn!("rosbridge forwarder did not stop in time"),
            }
        }

        let ticks = result?;
        info!(ticks, "teleop stopped");
        Ok::<(), TeleopError>(())
    })
}

/// Connect to rosbridge and start relaying `topic`.  Returns `None` (after
/// logging why) when the bridge is unreachable; teleop keeps running on the
/// local bus.
async fn spawn_forwarder(
    ctx: &Context,
    topic: &str,
    url: &str,
) -> Option<JoinHandle<Result<(), TeleopError>>> {
    let receiver = match ctx.subscribe(topic) {
        Ok(receiver) => receiver,
        Err(e) => {
            warn!(error = %e, "cannot subscribe forwarder");
            return None;
        }
    };

    match tokio::time::timeout(ROSBRIDGE_CONNECT_TIMEOUT, RosbridgeTransport::connect(url)).await {
        Ok(Ok(transport)) => {
            let forwarder = RosbridgeForwarder::new(receiver, transport);
            Some(tokio::spawn(forwarder.run(ctx.shutdown_signal())))
        }
        Ok(Err(e)) => {
            warn!(error = %e, "rosbridge unavailable; commands stay on the local bus");
            None
        }
        Err(_) => {
            warn!(url = %url, "rosbridge connect timed out; commands stay on the local bus");
            None
        }
    }
}
