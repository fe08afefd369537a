//! Runtime Settings
//!
//! Loading and validation of actor runtime settings. Settings come from an
//! optional TOML file layered under `ACTORS_`-prefixed environment variables
//! (nested keys separated by `__`, e.g. `ACTORS_SYSTEM__NAME=ui`).

use crate::defaults;
use anyhow::{ensure, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// System identity and routing defaults
    pub system: SystemSettings,

    /// Named dispatcher pools; empty means the built-in `cpu`/`io` pair
    pub dispatchers: HashMap<String, DispatcherSettings>,

    /// Ask hub sizing and default timeout
    pub ask: AskSettings,

    /// Dead-letter retention and logging
    pub dead_letters: DeadLetterSettings,

    /// Tracing subscriber settings
    pub logging: LoggingSettings,
}

/// System identity settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemSettings {
    pub name: String,
    pub default_dispatcher: String,
}

/// Worker pool flavour for a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    /// Fixed set of worker threads; behaviours must not block
    Pool,
    /// Elastic threads for behaviours that block on I/O
    Blocking,
}

/// Settings for one named dispatcher
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DispatcherSettings {
    pub kind: DispatcherKind,

    /// Worker count (pool) or thread ceiling (blocking)
    pub threads: Option<usize>,
}

/// Policy applied when an envelope arrives at a full mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming envelope
    #[default]
    DropNew,
    /// Evict the oldest queued envelope to make room
    DropOld,
    /// Reject the incoming envelope and fail the actor through supervision
    Fail,
}

impl OverflowPolicy {
    /// Label used in logs and dead-letter reasons
    pub fn name(self) -> &'static str {
        match self {
            OverflowPolicy::DropNew => "drop-new",
            OverflowPolicy::DropOld => "drop-old",
            OverflowPolicy::Fail => "fail",
        }
    }
}

/// Ask hub settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AskSettings {
    pub hub_capacity: usize,
    pub hub_overflow: OverflowPolicy,
    pub default_timeout_ms: u64,
}

/// Dead-letter sink settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadLetterSettings {
    /// Records retained for inspection
    pub capacity: usize,

    /// Emit a `warn` event per dead letter
    pub log: bool,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Fallback filter when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            name: defaults::system::DEFAULT_NAME.to_string(),
            default_dispatcher: defaults::dispatch::CPU_DISPATCHER.to_string(),
        }
    }
}

impl Default for AskSettings {
    fn default() -> Self {
        Self {
            hub_capacity: defaults::ask::HUB_CAPACITY,
            hub_overflow: OverflowPolicy::DropOld,
            default_timeout_ms: defaults::ask::DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Default for DeadLetterSettings {
    fn default() -> Self {
        Self {
            capacity: defaults::dead_letters::DEFAULT_CAPACITY,
            log: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading runtime config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::system::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: RuntimeConfig = builder
            .build()
            .context("Failed to build runtime configuration")?
            .try_deserialize()
            .context("Failed to deserialize runtime configuration")?;

        config.validate()?;
        debug!(system = %config.system.name, "Runtime configuration loaded");
        Ok(config)
    }

    /// Parse configuration from TOML text (no environment layering)
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RuntimeConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .context("Failed to parse runtime configuration")?
            .try_deserialize()
            .context("Failed to deserialize runtime configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize runtime configuration")
    }

    /// Reject settings the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.system.name.trim().is_empty(), "system.name must not be empty");
        ensure!(
            !self.system.name.contains('/') && !self.system.name.contains(':'),
            "system.name must not contain '/' or ':'"
        );
        ensure!(
            !self.system.default_dispatcher.trim().is_empty(),
            "system.default_dispatcher must not be empty"
        );

        if !self.dispatchers.is_empty() {
            ensure!(
                self.dispatchers.contains_key(&self.system.default_dispatcher),
                "default dispatcher '{}' is not defined in [dispatchers]",
                self.system.default_dispatcher
            );
        }

        for (id, settings) in &self.dispatchers {
            ensure!(!id.trim().is_empty(), "dispatcher id must not be empty");
            if let Some(threads) = settings.threads {
                ensure!(threads > 0, "dispatcher '{}' must have at least one thread", id);
            }
        }

        ensure!(self.ask.hub_capacity > 0, "ask.hub_capacity must be greater than 0");
        ensure!(self.ask.default_timeout_ms > 0, "ask.default_timeout_ms must be greater than 0");
        ensure!(self.dead_letters.capacity > 0, "dead_letters.capacity must be greater than 0");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.system.name, "actors");
        assert_eq!(config.system.default_dispatcher, "cpu");
        assert_eq!(config.ask.hub_capacity, 4096);
        assert_eq!(config.ask.hub_overflow, OverflowPolicy::DropOld);
        assert!(config.dispatchers.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.toml");

        let content = r#"
[system]
name = "ui"
default_dispatcher = "cpu"

[dispatchers.cpu]
kind = "pool"
threads = 4

[dispatchers.io]
kind = "blocking"

[ask]
hub_capacity = 128
hub_overflow = "drop_new"

[dead_letters]
log = false
"#;
        fs::write(&path, content).unwrap();

        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.system.name, "ui");
        assert_eq!(config.dispatchers.len(), 2);
        assert_eq!(config.dispatchers["cpu"].kind, DispatcherKind::Pool);
        assert_eq!(config.dispatchers["cpu"].threads, Some(4));
        assert_eq!(config.dispatchers["io"].kind, DispatcherKind::Blocking);
        assert_eq!(config.ask.hub_capacity, 128);
        assert_eq!(config.ask.hub_overflow, OverflowPolicy::DropNew);
        assert_eq!(config.ask.default_timeout_ms, 5_000);
        assert!(!config.dead_letters.log);
        assert_eq!(config.dead_letters.capacity, 512);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(RuntimeConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_undefined_default_dispatcher_rejected() {
        let content = r#"
[system]
default_dispatcher = "main"

[dispatchers.cpu]
kind = "pool"
"#;
        let err = RuntimeConfig::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let content = r#"
[dispatchers.cpu]
kind = "pool"
threads = 0
"#;
        assert!(RuntimeConfig::from_toml_str(content).is_err());
    }

    #[test]
    fn test_effective_config_dump() {
        let mut config = RuntimeConfig::default();
        config.dispatchers.insert(
            "cpu".to_string(),
            DispatcherSettings { kind: DispatcherKind::Pool, threads: Some(2) },
        );

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[dispatchers.cpu]"));
        assert!(text.contains("kind = \"pool\""));
        assert!(text.contains("hub_overflow = \"drop_old\""));
    }

    #[test]
    fn test_overflow_policy_names() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropNew);
        assert_eq!(OverflowPolicy::DropOld.name(), "drop-old");
        assert_eq!(OverflowPolicy::Fail.name(), "fail");
    }
}
