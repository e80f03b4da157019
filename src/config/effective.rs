//! Effective configuration with provenance
//!
//! Captures the merged configuration, where each contributing layer came
//! from, and the typed [`Settings`] extracted from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::run::{InterfaceKind, RunConfiguration};
use crate::record::{FileSink, LogSink, StderrSink, TracingSink};

/// Schema version for the effective config dump
pub const SCHEMA_VERSION: u32 = 1;

/// Upper bound for `max_trace_lines`
const MAX_TRACE_LINES_LIMIT: usize = 10_000;

/// Origin of a configuration layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// A contributing config layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this layer
    pub origin: ConfigOrigin,

    /// File path (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Interface selection as written in config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceSetting {
    /// Detect from the environment at startup
    Auto,
    Cli,
    Network,
}

/// Where diagnostic lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Tracing,
    File,
    Stderr,
}

/// `[log]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub sink: SinkKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Typed view of the merged configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub interface: InterfaceSetting,
    pub max_trace_lines: usize,
    pub log: LogSettings,
}

impl Settings {
    /// Resolve the interface, detecting it if configured as `auto`
    pub fn interface_kind(&self) -> InterfaceKind {
        match self.interface {
            InterfaceSetting::Auto => InterfaceKind::detect(),
            InterfaceSetting::Cli => InterfaceKind::Cli,
            InterfaceSetting::Network => InterfaceKind::Network,
        }
    }

    /// Freeze into the process-wide run configuration
    pub fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration::with_interface(self.debug, self.interface_kind())
            .with_max_trace_lines(self.max_trace_lines)
    }

    /// Build the configured log sink
    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        match (self.log.sink, &self.log.file) {
            (SinkKind::File, Some(path)) => Arc::new(FileSink::new(path)),
            (SinkKind::Stderr, _) => Arc::new(StderrSink),
            // Validation rejects a file sink without a path.
            _ => Arc::new(TracingSink),
        }
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Schema version
    pub schema_version: u32,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,

    /// Typed settings extracted from `config`
    #[serde(skip)]
    settings: Option<Settings>,
}

impl EffectiveConfig {
    /// Build effective config from layers
    pub fn build(
        config_path: Option<&Path>,
        env_overrides: Option<Value>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        if let Some(path) = config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(env) = env_overrides {
            layers.push(env);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
                digest: None,
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings = Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            config: merged,
            sources,
            settings: Some(settings),
        })
    }

    /// Typed settings
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        match &self.settings {
            Some(settings) => Ok(settings.clone()),
            None => Self::validate_config(&self.config),
        }
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Extract and validate typed settings
    fn validate_config(config: &Value) -> Result<Settings, ConfigError> {
        let settings: Settings = serde_json::from_value(config.clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if settings.max_trace_lines == 0 || settings.max_trace_lines > MAX_TRACE_LINES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_trace_lines must be in [1, {}]",
                MAX_TRACE_LINES_LIMIT
            )));
        }

        if settings.log.sink == SinkKind::File && settings.log.file.is_none() {
            return Err(ConfigError::ValidationError(
                "log.file is required when log.sink = \"file\"".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the environment layer from `FAULTLINE_*` variables.
///
/// Recognized: `FAULTLINE_DEBUG`, `FAULTLINE_INTERFACE`,
/// `FAULTLINE_LOG_FILE` (also selects the file sink) and
/// `FAULTLINE_MAX_TRACE_LINES`. Returns `None` when none are set.
pub fn env_layer<I>(vars: I) -> Result<Option<Value>, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut layer = serde_json::Map::new();

    for (key, value) in vars {
        match key.as_str() {
            "FAULTLINE_DEBUG" => {
                layer.insert("debug".to_string(), Value::Bool(parse_flag(&key, &value)?));
            }
            "FAULTLINE_INTERFACE" => {
                layer.insert("interface".to_string(), Value::String(value));
            }
            "FAULTLINE_LOG_FILE" => {
                layer.insert(
                    "log".to_string(),
                    serde_json::json!({ "sink": "file", "file": value }),
                );
            }
            "FAULTLINE_MAX_TRACE_LINES" => {
                let lines: u64 = value.trim().parse().map_err(|_| {
                    ConfigError::ParseError(format!("{} must be an integer, got {:?}", key, value))
                })?;
                layer.insert("max_trace_lines".to_string(), Value::from(lines));
            }
            _ => {}
        }
    }

    Ok(if layer.is_empty() {
        None
    } else {
        Some(Value::Object(layer))
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::ParseError(format!(
            "{} must be a boolean, got {:?}",
            key, value
        ))),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
