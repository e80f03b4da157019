//! The fixed severity table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A recognized failure category.
///
/// Discriminants are the wire codes carried by failure signals. They are
/// single bits (except `Exception`, which is zero) so that sets of
/// severities can be expressed as a [`SeverityMask`](crate::SeverityMask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum Severity {
    /// Generic thrown exception
    Exception = 0,
    /// Fatal runtime error
    Error = 1,
    /// Runtime warning
    Warning = 2,
    /// Parse error
    Parse = 4,
    /// Runtime notice
    Notice = 8,
    /// Fatal error raised during startup
    CoreError = 16,
    /// Warning raised during startup
    CoreWarning = 32,
    /// Fatal compile-time error
    CompileError = 64,
    /// Compile-time warning
    CompileWarning = 128,
    /// Fatal error raised by application code
    UserError = 256,
    /// Warning raised by application code
    UserWarning = 512,
    /// Notice raised by application code
    UserNotice = 1024,
    /// Strictness suggestion
    Strict = 2048,
    /// Deprecation notice
    Deprecated = 8192,
}

/// Severity class, which drives display and termination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityClass {
    /// Always logged, always displayed, always terminates
    Fatal,
    /// Displayed and terminates only in debug mode
    Recoverable,
    /// Thrown and uncaught; always displayed, ends via unwind
    Exception,
}

impl Severity {
    /// Every severity in table order.
    pub const ALL: [Severity; 14] = [
        Severity::Exception,
        Severity::Error,
        Severity::Warning,
        Severity::Parse,
        Severity::Notice,
        Severity::CoreError,
        Severity::CoreWarning,
        Severity::CompileError,
        Severity::CompileWarning,
        Severity::UserError,
        Severity::UserWarning,
        Severity::UserNotice,
        Severity::Strict,
        Severity::Deprecated,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a severity by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Human-readable category label.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Exception => "Exception",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Parse => "Parsing Error",
            Severity::Notice => "Notice",
            Severity::CoreError => "Core Error",
            Severity::CoreWarning => "Core Warning",
            Severity::CompileError => "Compile Error",
            Severity::CompileWarning => "Compile Warning",
            Severity::UserError => "User Error",
            Severity::UserWarning => "User Warning",
            Severity::UserNotice => "User Notice",
            Severity::Strict => "Runtime Notice",
            Severity::Deprecated => "Deprecated",
        }
    }

    /// Stable machine name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Exception => "EXCEPTION",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Parse => "PARSE",
            Severity::Notice => "NOTICE",
            Severity::CoreError => "CORE_ERROR",
            Severity::CoreWarning => "CORE_WARNING",
            Severity::CompileError => "COMPILE_ERROR",
            Severity::CompileWarning => "COMPILE_WARNING",
            Severity::UserError => "USER_ERROR",
            Severity::UserWarning => "USER_WARNING",
            Severity::UserNotice => "USER_NOTICE",
            Severity::Strict => "STRICT",
            Severity::Deprecated => "DEPRECATED",
        }
    }

}

impl SeverityClass {
    /// Policy class of a raw code on the live signal path. Unknown codes are
    /// fatal only when every bit is a live-fatal severity.
    pub fn of_code(code: u32) -> Self {
        if code == Severity::Exception.code() {
            SeverityClass::Exception
        } else if crate::SeverityMask::LIVE_FATAL.contains(code) {
            SeverityClass::Fatal
        } else {
            SeverityClass::Recoverable
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a severity name or code is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    /// Accepts a machine name in any case (`warning`, `USER_ERROR`,
    /// `user-error`) or a numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u32>() {
            return Severity::from_code(code).ok_or_else(|| UnknownSeverity(s.to_string()));
        }

        let normalized = trimmed.to_ascii_uppercase().replace('-', "_");
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == normalized)
            .ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}
