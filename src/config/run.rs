//! Process-wide run configuration
//!
//! Constructed once when the pipeline is initialized and never mutated
//! afterwards.

use faultline_severity::SeverityMask;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable that marks a CGI-style networked response
pub const GATEWAY_INTERFACE_VAR: &str = "GATEWAY_INTERFACE";

/// Default cap on trace lines written per event
pub const DEFAULT_MAX_TRACE_LINES: usize = 100;

/// How the process talks to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Interactive terminal / command line
    Cli,
    /// Response to a networked request (HTML body)
    Network,
}

impl InterfaceKind {
    /// Detect the interface from the process environment
    pub fn detect() -> Self {
        Self::from_gateway(std::env::var_os(GATEWAY_INTERFACE_VAR).is_some())
    }

    fn from_gateway(present: bool) -> Self {
        if present {
            InterfaceKind::Network
        } else {
            InterfaceKind::Cli
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceKind::Cli => "cli",
            InterfaceKind::Network => "network",
        }
    }
}

impl FromStr for InterfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" => Ok(InterfaceKind::Cli),
            "network" => Ok(InterfaceKind::Network),
            other => Err(format!("unknown interface kind: {}", other)),
        }
    }
}

/// Immutable configuration shared by every interception callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Verbose display and logging, relaxed thresholds
    pub debug_mode: bool,

    /// Caller interface, fixed at startup
    pub interface_kind: InterfaceKind,

    /// Cap on trace lines written per event
    pub max_trace_lines: usize,
}

impl RunConfiguration {
    /// Configuration with the interface detected from the environment
    pub fn new(debug_mode: bool) -> Self {
        Self::with_interface(debug_mode, InterfaceKind::detect())
    }

    /// Configuration with an explicit interface
    pub fn with_interface(debug_mode: bool, interface_kind: InterfaceKind) -> Self {
        Self {
            debug_mode,
            interface_kind,
            max_trace_lines: DEFAULT_MAX_TRACE_LINES,
        }
    }

    /// Override the trace line cap
    pub fn with_max_trace_lines(mut self, max_trace_lines: usize) -> Self {
        self.max_trace_lines = max_trace_lines;
        self
    }

    /// Reporting verbosity the host should apply: maximal in debug mode,
    /// notices and deprecations suppressed otherwise
    pub fn reporting_mask(&self) -> SeverityMask {
        if self.debug_mode {
            SeverityMask::ALL
        } else {
            SeverityMask::PRODUCTION
        }
    }
}
