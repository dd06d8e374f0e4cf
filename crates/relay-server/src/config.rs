//! Server configuration.
//!
//! Loaded in three layers (in priority order): compiled defaults, an
//! optional JSON file deep-merged over them, and `RELAY_*` environment
//! variable overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use relay_runtime::TurnOptions;

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound queue capacity (frames).
    pub outbound_queue_size: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Default deadline for a confirmation round trip in seconds.
    pub confirmation_timeout_secs: u64,
    /// Maximum model/tool iterations per turn.
    pub max_tool_iterations: u32,
    /// How long an orphaned session may linger before it is closed.
    pub session_grace_secs: u64,
    /// Orphan sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 50,
            outbound_queue_size: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            confirmation_timeout_secs: 30,
            max_tool_iterations: 16,
            session_grace_secs: 60,
            sweep_interval_secs: 5,
        }
    }
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid JSON (or does not match the schema).
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerConfig {
    /// Load from an optional JSON file with env var overrides.
    ///
    /// A missing file is not an error: defaults are used. Invalid JSON is.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let defaults = serde_json::to_value(Self::default())?;

        let merged = if path.exists() {
            debug!(?path, "loading config from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        } else {
            debug!(?path, "config file not found, using defaults");
            defaults
        };

        let mut config: Self = serde_json::from_value(merged)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `RELAY_*` environment variable overrides. Invalid values are
    /// ignored, falling back to the file/default value.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = read_env("RELAY_HOST") {
            self.host = v;
        }
        if let Some(v) = read_env_parsed::<u16>("RELAY_PORT") {
            self.port = v;
        }
        if let Some(v) = read_env_parsed::<usize>("RELAY_MAX_CONNECTIONS") {
            self.max_connections = v;
        }
        if let Some(v) = read_env_parsed::<u64>("RELAY_CONFIRMATION_TIMEOUT_SECS") {
            self.confirmation_timeout_secs = v;
        }
        if let Some(v) = read_env_parsed::<u32>("RELAY_MAX_TOOL_ITERATIONS") {
            self.max_tool_iterations = v;
        }
        if let Some(v) = read_env_parsed::<u64>("RELAY_SESSION_GRACE_SECS") {
            self.session_grace_secs = v;
        }
    }

    /// The per-turn options this config implies.
    pub fn turn_options(&self) -> TurnOptions {
        TurnOptions {
            max_iterations: self.max_tool_iterations,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }

    /// Session grace period as a duration.
    pub fn session_grace(&self) -> Duration {
        Duration::from_secs(self.session_grace_secs)
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    read_env(name).and_then(|v| v.parse().ok())
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge recursively (source overrides target per-key); arrays and
/// primitives are replaced entirely; nulls in source are skipped.
fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}
