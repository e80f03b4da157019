//! Crate-level error type

use faultline_severity::UnknownSeverity;

use crate::config::ConfigError;

/// Errors from setting up the pipeline. The pipeline itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Severity(#[from] UnknownSeverity),

    #[error("Failure pipeline already installed in this process")]
    AlreadyInstalled,
}
