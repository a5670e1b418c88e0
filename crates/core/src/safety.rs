//! Safety layer: normalizes write parameters before they reach the device.
//!
//! Out-of-range speed values are clamped, never rejected. The device treats
//! the percent byte as a duty cycle; values above 100 have no documented
//! meaning, so they are pinned to 100 before encoding.
//!
//! ## Safety Invariants
//! 1. Every pump/fan percent written to the device is in [0, 100]
//! 2. Clamping happens BEFORE encoding, so no out-of-range byte is ever framed
//! 3. Colour bytes are not validated; the full 0–255 range is valid

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Disclaimer for any user-facing output about device writes.
pub const COOLING_DISCLAIMER: &str = "\
WARNING: This software writes directly to your cooler's pump and fan controller. \
The command layout is based on observed behaviour, not vendor documentation. \
Running the pump at low speed can overheat your CPU. Use at your own risk.";

/// Highest accepted duty cycle.
pub const PERCENT_MAX: u8 = 100;

/// Clamp a raw percent to [0, 100].
pub fn clamp_percent(raw: u8) -> u8 {
    raw.min(PERCENT_MAX)
}

/// A duty cycle in [0, 100].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "u64", into = "u8")]
pub struct Percent(u8);

impl Percent {
    /// Build a percent, clamping silently.
    pub fn new(raw: u8) -> Self {
        let clamped = clamp_percent(raw);
        if clamped != raw {
            debug!(raw, clamped, "Percent value clamped");
        }
        Self(clamped)
    }

    /// Build a percent from a wider integer, saturating before clamping.
    pub fn saturating(raw: impl Into<u64>) -> Self {
        Self::new(u8::try_from(raw.into()).unwrap_or(u8::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for Percent {
    fn from(raw: u8) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for Percent {
    fn from(raw: u64) -> Self {
        Self::saturating(raw)
    }
}

impl From<Percent> for u8 {
    fn from(p: Percent) -> Self {
        p.0
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
