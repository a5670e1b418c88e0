//! Cooling profiles: a saved pump/fan/LED configuration.

use crate::commands;
use crate::device::{Color, LedMode};
use crate::error::{Error, Result};
use crate::safety::Percent;
use crate::session::DeviceSession;
use crate::transport::UsbHandle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// LED part of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedSetting {
    pub mode: LedMode,
    pub color: Color,
}

/// A saved cooler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile display name.
    pub name: String,
    pub pump: Percent,
    /// Fan duty cycles (index = fan header).
    pub fans: [Percent; 2],
    pub led: LedSetting,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Default".into(),
            pump: Percent::new(70),
            fans: [Percent::new(60), Percent::new(60)],
            led: LedSetting {
                mode: LedMode::Pulse,
                color: Color::BLUE,
            },
        }
    }
}

/// Read a profile from a JSON file.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read profile {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| Error::Config(format!("parse profile: {e}")))
}

/// Write a profile to a JSON file.
pub fn save_profile(path: &Path, profile: &Profile) -> Result<()> {
    let json = serde_json::to_string_pretty(profile)
        .map_err(|e| Error::Config(format!("serialize profile: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| Error::Config(format!("write profile {}: {e}", path.display())))
}

/// Apply a profile: pump, each fan, then LED. Stops at the first failure.
pub fn apply_profile<H: UsbHandle>(session: &mut DeviceSession<H>, profile: &Profile) -> Result<()> {
    commands::set_pump_speed(session, profile.pump.get())?;
    for (fan_index, duty) in (0u8..).zip(profile.fans.iter()) {
        commands::set_fan_speed(session, fan_index, duty.get())?;
    }
    let LedSetting { mode, color } = profile.led;
    commands::set_led(session, mode, color.r, color.g, color.b)?;

    info!(profile = %profile.name, "Profile applied");
    Ok(())
}
