//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use super::run::DEFAULT_MAX_TRACE_LINES;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "faultline.toml";

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Debug mode (default: false)
    pub debug: bool,

    /// Interface selection (default: "auto", detected from the environment)
    pub interface: String,

    /// Trace lines written per event (default: 100)
    pub max_trace_lines: usize,

    /// Log sink (default: "tracing")
    pub log_sink: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            debug: false,
            interface: "auto".to_string(),
            max_trace_lines: DEFAULT_MAX_TRACE_LINES,
            log_sink: "tracing".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "debug": self.debug,
            "interface": self.interface,
            "max_trace_lines": self.max_trace_lines,
            "log": {
                "sink": self.log_sink
            }
        })
    }
}
