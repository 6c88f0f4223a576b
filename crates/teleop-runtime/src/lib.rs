//! `teleop-runtime` – the keyboard-to-velocity control loop.
//!
//! # Modules
//!
//! - [`context`] – [`Context`][context::Context]: explicit runtime handle that
//!   owns the bus and shutdown signal, creates publishers, and drives a
//!   [`Tick`][context::Tick] at a fixed period.
//! - [`teleop`] – [`TeleopNode`][teleop::TeleopNode]: polls one key per tick,
//!   updates the velocity state through the pure
//!   [`apply_effect`][teleop::apply_effect], and publishes the command.
//! - [`keys`] – [`KeySource`][keys::KeySource] capability with a crossterm
//!   terminal implementation and a scripted one for tests.
//! - [`terminal`] – [`RawModeGuard`][terminal::RawModeGuard]: raw mode for
//!   the lifetime of a scope.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP export.

pub mod context;
pub mod keys;
pub mod teleop;
pub mod telemetry;
pub mod terminal;

pub use context::{Context, ContextOptions, Tick};
pub use keys::{KeySource, ScriptedKeys, TerminalKeys};
pub use teleop::{KeyEffect, TICK_PERIOD, TeleopNode, apply_effect};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use terminal::RawModeGuard;
