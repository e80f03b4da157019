//! Severity taxonomy for failure codes.
//!
//! Maps the numeric code carried by a failure signal to a category label and
//! groups codes into the masks the pipeline uses to decide termination and
//! reporting verbosity. Lookup never fails: a code outside the table renders
//! as its decimal value.

mod mask;
mod severity;

pub use mask::SeverityMask;
pub use severity::{Severity, SeverityClass, UnknownSeverity};

use std::borrow::Cow;

/// Resolve a raw failure code to its display label.
///
/// Known codes map to the fixed label table; anything else is returned as the
/// code itself.
pub fn classify(code: u32) -> Cow<'static, str> {
    match Severity::from_code(code) {
        Some(severity) => Cow::Borrowed(severity.label()),
        None => Cow::Owned(code.to_string()),
    }
}
