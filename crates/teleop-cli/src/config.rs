//! Configuration – reads `~/.turtle_teleop/config.toml`.
//!
//! The file is optional; every field has a default, and `TELEOP_*`
//! environment variables override whatever the file says.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use teleop_middleware::bus::DEFAULT_CAPACITY;
use teleop_middleware::rosbridge::DEFAULT_ROSBRIDGE_URL;
use teleop_types::TeleopError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Relay commands to a rosbridge_server.
    #[serde(default = "default_rosbridge_enabled")]
    pub rosbridge_enabled: bool,

    /// WebSocket URL of the rosbridge_server.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Per-topic queue depth on the internal bus.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_rosbridge_enabled() -> bool {
    true
}
fn default_rosbridge_url() -> String {
    DEFAULT_ROSBRIDGE_URL.to_string()
}
fn default_queue_depth() -> usize {
    DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_enabled: default_rosbridge_enabled(),
            rosbridge_url: default_rosbridge_url(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Return the path to `~/.turtle_teleop/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".turtle_teleop").join("config.toml")
}

/// Load the config, falling back to defaults when the file is absent.
/// Environment overrides are applied either way.
pub fn load() -> Result<Config, TeleopError> {
    let mut cfg = load_from(&config_path())?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config file at `path` without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Config, TeleopError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TeleopError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    toml::from_str(&raw).map_err(|e| TeleopError::Config(format!("Failed to parse config: {}", e)))
}

/// Apply `TELEOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELEOP_ROSBRIDGE_ENABLED` | `rosbridge_enabled` (`true`/`false`/`1`/`0`) |
/// | `TELEOP_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `TELEOP_QUEUE_DEPTH` | `queue_depth` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELEOP_ROSBRIDGE_ENABLED")
        && let Some(enabled) = parse_flag(&v)
    {
        cfg.rosbridge_enabled = enabled;
    }
    if let Ok(v) = std::env::var("TELEOP_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("TELEOP_QUEUE_DEPTH")
        && let Ok(depth) = v.parse::<usize>()
    {
        cfg.queue_depth = depth;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
