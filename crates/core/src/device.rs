//! Device model: supported coolers, LED modes, and colours.

use crate::{pids, CORSAIR_VID};
use serde::{Deserialize, Serialize};

/// Supported Corsair cooler models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolerModel {
    H80iV2,
    /// Alternate product ID seen for the same cooler; unconfirmed.
    H80iV2Alt,
}

impl CoolerModel {
    pub const ALL: &'static [CoolerModel] = &[CoolerModel::H80iV2, CoolerModel::H80iV2Alt];

    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::H80I_V2 => Some(Self::H80iV2),
            pids::H80I_V2_ALT => Some(Self::H80iV2Alt),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H80iV2 => "Corsair H80i V2",
            Self::H80iV2Alt => "Corsair H80i V2 (alternate PID)",
        }
    }

    /// USB Vendor ID.
    pub fn vid(&self) -> u16 {
        CORSAIR_VID
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::H80iV2 => pids::H80I_V2,
            Self::H80iV2Alt => pids::H80I_V2_ALT,
        }
    }
}

/// Information about a discovered cooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: CoolerModel,
    pub vid: u16,
    pub pid: u16,
    pub bus: u8,
    pub address: u8,
}

/// Number of fan headers on the cooler.
pub const FAN_COUNT: u8 = 2;

/// LED animation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LedMode {
    Static = 0x00,
    Blink = 0x01,
    Pulse = 0x02,
    Rainbow = 0x03,
}

impl LedMode {
    pub const ALL: &'static [LedMode] = &[
        LedMode::Static,
        LedMode::Blink,
        LedMode::Pulse,
        LedMode::Rainbow,
    ];

    /// Wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Blink => "blink",
            Self::Pulse => "pulse",
            Self::Rainbow => "rainbow",
        }
    }

    /// Parse a mode name (case-insensitive). "fixed" and "breathing" are accepted aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "static" | "fixed" | "solid" => Some(Self::Static),
            "blink" | "flash" => Some(Self::Blink),
            "pulse" | "breathing" => Some(Self::Pulse),
            "rainbow" | "cycle" => Some(Self::Rainbow),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `rrggbb`, optionally prefixed with `#`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
