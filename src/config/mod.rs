//! Configuration layering
//!
//! The pipeline settings are merged from four layers, lowest precedence
//! first:
//! 1. Built-in defaults
//! 2. Config file (`faultline.toml`)
//! 3. Environment (`FAULTLINE_*`)
//! 4. CLI flags
//!
//! The merged result is frozen into a [`RunConfiguration`] at startup.

mod defaults;
mod effective;
mod merge;
mod run;

pub use defaults::{BuiltinDefaults, DEFAULT_CONFIG_FILE};
pub use effective::{
    env_layer, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, InterfaceSetting,
    LogSettings, Settings, SinkKind,
};
pub use merge::{deep_merge, merge_layers};
pub use run::{InterfaceKind, RunConfiguration, DEFAULT_MAX_TRACE_LINES, GATEWAY_INTERFACE_VAR};
