//! Sets of severity codes.

use serde::{Deserialize, Serialize};

use crate::Severity;

/// Bit set over severity codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityMask(u32);

const fn bits(severities: &[Severity]) -> u32 {
    let mut acc = 0;
    let mut i = 0;
    while i < severities.len() {
        acc |= severities[i] as u32;
        i += 1;
    }
    acc
}

/// User-raised deprecation code; outside the label table but masked out of
/// production reporting alongside the other deprecations.
const USER_DEPRECATED: u32 = 16384;

impl SeverityMask {
    /// Codes that terminate the process when signalled live.
    pub const LIVE_FATAL: SeverityMask = SeverityMask(bits(&[
        Severity::Error,
        Severity::Parse,
        Severity::CoreError,
        Severity::CompileError,
        Severity::UserError,
    ]));

    /// Codes that count as fatal when found by the shutdown scan.
    ///
    /// Differs from [`LIVE_FATAL`](Self::LIVE_FATAL): startup and compile
    /// warnings are included, user errors are not.
    pub const SHUTDOWN_FATAL: SeverityMask = SeverityMask(bits(&[
        Severity::Error,
        Severity::Parse,
        Severity::CoreError,
        Severity::CoreWarning,
        Severity::CompileError,
        Severity::CompileWarning,
    ]));

    /// Every code.
    pub const ALL: SeverityMask = SeverityMask(u32::MAX);

    /// Production reporting level: everything except notices and deprecations.
    pub const PRODUCTION: SeverityMask = SeverityMask(
        u32::MAX
            & !bits(&[
                Severity::Notice,
                Severity::Deprecated,
                Severity::Strict,
                Severity::UserNotice,
            ])
            & !USER_DEPRECATED,
    );

    /// Build a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        SeverityMask(bits)
    }

    /// Raw bits of the mask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when `code` is non-zero and every bit of it lies in the mask.
    pub fn contains(self, code: u32) -> bool {
        code != 0 && code & self.0 == code
    }

    /// True when the severity is a member of the mask.
    pub fn includes(self, severity: Severity) -> bool {
        self.contains(severity.code())
    }
}

impl Default for SeverityMask {
    fn default() -> Self {
        SeverityMask::ALL
    }
}

impl FromIterator<Severity> for SeverityMask {
    fn from_iter<I: IntoIterator<Item = Severity>>(iter: I) -> Self {
        SeverityMask(iter.into_iter().fold(0, |acc, s| acc | s.code()))
    }
}
