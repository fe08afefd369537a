//! # Actor Runtime Configuration
//!
//! Settings and shared constants for the actor runtime, kept in their own
//! crate so applications can load and validate configuration without
//! pulling in the thread pools.
//!
//! ## Usage
//!
//! ```rust
//! use runtime_config::{defaults, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_toml_str("[system]\nname = \"ui\"").unwrap();
//! assert_eq!(config.system.name, "ui");
//! assert_eq!(defaults::mailbox::DEFAULT_CAPACITY, 1024);
//! ```

pub mod defaults;
pub mod settings;

pub use settings::{
    AskSettings, DeadLetterSettings, DispatcherKind, DispatcherSettings, LoggingSettings,
    OverflowPolicy, RuntimeConfig, SystemSettings,
};
