//! Scoped raw mode for the controlling terminal.

use crossterm::terminal;
use teleop_types::TeleopError;
use tracing::{debug, warn};

/// Holds the terminal in raw mode (unbuffered, no echo) for as long as it
/// lives.
///
/// crossterm snapshots the original termios attributes when raw mode is
/// enabled and writes that snapshot back when it is disabled, so dropping the
/// guard restores exactly the settings that were in place before
/// [`acquire`][Self::acquire].  The drop runs on every exit path out of the
/// owning scope, including `?` returns and panics.
#[must_use = "raw mode is released as soon as the guard is dropped"]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Switch the terminal into raw mode.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Terminal`] when stdin is not a terminal or the
    /// attributes cannot be changed.
    pub fn acquire() -> Result<Self, TeleopError> {
        terminal::enable_raw_mode()
            .map_err(|e| TeleopError::Terminal(format!("enable raw mode: {e}")))?;
        debug!("terminal raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best effort: nothing else can be done if the restore fails.
        match terminal::disable_raw_mode() {
            Ok(()) => debug!("terminal mode restored"),
            Err(e) => warn!(error = %e, "failed to restore terminal mode"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::fd::AsFd;
    use std::process::{Command, Stdio};

    use nix::pty::openpty;
    use nix::sys::termios::{LocalFlags, Termios, tcgetattr};

    const CHILD_ENV: &str = "TELEOP_RAW_MODE_CHILD";

    fn assert_same_attrs(before: &Termios, after: &Termios) {
        assert_eq!(before.input_flags, after.input_flags);
        assert_eq!(before.output_flags, after.output_flags);
        assert_eq!(before.control_flags, after.control_flags);
        assert_eq!(before.local_flags, after.local_flags);
        assert_eq!(before.control_chars, after.control_chars);
    }

    /// Re-runs this test binary with a pty slave as stdin, so the guard
    /// works on a real terminal even when `cargo test` has none.
    #[test]
    fn guard_restores_pty_attributes_on_drop_and_on_unwind() {
        let pty = openpty(None, None).unwrap();
        let before = tcgetattr(pty.slave.as_fd()).unwrap();

        let output = Command::new(std::env::current_exe().unwrap())
            .args(["terminal::tests::raw_mode_round_trip_on_stdin", "--exact"])
            .env(CHILD_ENV, "1")
            .stdin(Stdio::from(pty.slave.try_clone().unwrap()))
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "child failed: {}",
            String::from_utf8_lossy(&output.stdout)
        );

        let after = tcgetattr(pty.slave.as_fd()).unwrap();
        assert_same_attrs(&before, &after);
    }

    /// Child half of the pty test; a no-op when run directly.
    #[test]
    fn raw_mode_round_trip_on_stdin() {
        if std::env::var_os(CHILD_ENV).is_none() {
            return;
        }
        let stdin = std::io::stdin();
        let before = tcgetattr(stdin.as_fd()).unwrap();

        {
            let _guard = RawModeGuard::acquire().unwrap();
            let raw = tcgetattr(stdin.as_fd()).unwrap();
            assert!(!raw.local_flags.contains(LocalFlags::ICANON));
            assert!(!raw.local_flags.contains(LocalFlags::ECHO));
        }
        assert_same_attrs(&before, &tcgetattr(stdin.as_fd()).unwrap());

        let result = std::panic::catch_unwind(|| {
            let _guard = RawModeGuard::acquire().unwrap();
            panic!("fault while teleoperating");
        });
        assert!(result.is_err());
        assert_same_attrs(&before, &tcgetattr(stdin.as_fd()).unwrap());
    }
}
