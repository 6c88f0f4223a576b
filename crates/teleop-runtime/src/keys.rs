//! Non-blocking keyboard input.
//!
//! [`KeySource`] is the capability the teleop node polls once per tick.
//! [`TerminalKeys`] reads the real terminal through crossterm;
//! [`ScriptedKeys`] replays a fixed sequence for tests.

use std::collections::VecDeque;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use teleop_middleware::ShutdownSignal;
use teleop_types::TeleopError;
use tracing::info;

pub trait KeySource {
    /// Return the next buffered keystroke, if any, without blocking.
    fn poll_key(&mut self) -> Result<Option<char>, TeleopError>;
}

/// Keystrokes from the controlling terminal.
///
/// Expects the terminal to be in raw mode (see
/// [`RawModeGuard`][crate::terminal::RawModeGuard]).  Raw mode turns Ctrl-C
/// into an ordinary key event instead of SIGINT, so it is mapped to a
/// shutdown request here.
pub struct TerminalKeys {
    shutdown: ShutdownSignal,
}

impl TerminalKeys {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self) -> Result<Option<char>, TeleopError> {
        let ready = event::poll(Duration::ZERO)
            .map_err(|e| TeleopError::Terminal(format!("poll stdin: {e}")))?;
        if !ready {
            return Ok(None);
        }
        let event = event::read().map_err(|e| TeleopError::Terminal(format!("read stdin: {e}")))?;
        Ok(self.translate(event))
    }
}

impl TerminalKeys {
    fn translate(&self, event: Event) -> Option<char> {
        match event {
            Event::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) if modifiers.contains(KeyModifiers::CONTROL) => {
                info!("interrupt received");
                self.shutdown.request();
                None
            }
            // Ctrl/Alt chords are different bytes on a cooked terminal, not
            // the plain letter.
            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) if KeyModifiers::SHIFT.contains(modifiers) => Some(c),
            _ => None,
        }
    }
}

/// Replays a scripted sequence of polls.  `None` entries model ticks where
/// no key was pressed; once the script runs out every poll returns `None`.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    script: VecDeque<Option<char>>,
}

impl ScriptedKeys {
    pub fn new(script: impl IntoIterator<Item = Option<char>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// One keystroke per tick, no idle ticks in between.
    pub fn from_keys(keys: &str) -> Self {
        Self::new(keys.chars().map(Some))
    }

    /// Polls left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> Result<Option<char>, TeleopError> {
        Ok(self.script.pop_front().flatten())
    }
}
