//! Session configuration: device identifiers, endpoints, and timing.
//!
//! Defaults match the H80i V2 as observed. Any field may be overridden from a
//! JSON file; missing fields keep their defaults.

use crate::error::{Error, Result};
use crate::{pids, CORSAIR_VID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Interface carrying the interrupt endpoints.
pub const DEFAULT_INTERFACE: u8 = 0;
/// Interrupt OUT endpoint address.
pub const DEFAULT_ENDPOINT_OUT: u8 = 0x02;
/// Interrupt IN endpoint address.
pub const DEFAULT_ENDPOINT_IN: u8 = 0x81;
/// Bound on every blocking transfer.
pub const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 1000;
/// Wait after the init frame before the device accepts commands.
pub const DEFAULT_INIT_SETTLE_MS: u64 = 500;
/// Wait between a status request and reading the reply.
pub const DEFAULT_STATUS_DELAY_MS: u64 = 50;

/// Tunables for a device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint_out: u8,
    pub endpoint_in: u8,
    pub transfer_timeout_ms: u64,
    pub init_settle_ms: u64,
    pub status_delay_ms: u64,
    /// Minimum spacing between consecutive OUT transfers.
    pub command_gap_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vendor_id: CORSAIR_VID,
            product_id: pids::H80I_V2,
            interface: DEFAULT_INTERFACE,
            endpoint_out: DEFAULT_ENDPOINT_OUT,
            endpoint_in: DEFAULT_ENDPOINT_IN,
            transfer_timeout_ms: DEFAULT_TRANSFER_TIMEOUT_MS,
            init_settle_ms: DEFAULT_INIT_SETTLE_MS,
            status_delay_ms: DEFAULT_STATUS_DELAY_MS,
            command_gap_ms: 0,
        }
    }
}

impl SessionConfig {
    /// Default configuration for a specific device.
    pub fn for_device(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::Config(format!("parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the transport cannot honour.
    ///
    /// libusb reads a zero timeout as "wait forever", so transfers must have a
    /// non-zero bound.
    pub fn validate(&self) -> Result<()> {
        if self.transfer_timeout_ms == 0 {
            return Err(Error::Config(
                "transfer_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn init_settle(&self) -> Duration {
        Duration::from_millis(self.init_settle_ms)
    }

    pub fn status_delay(&self) -> Duration {
        Duration::from_millis(self.status_delay_ms)
    }

    pub fn command_gap(&self) -> Duration {
        Duration::from_millis(self.command_gap_ms)
    }

    /// Same configuration with every delay set to zero.
    #[cfg(test)]
    pub fn without_delays() -> Self {
        Self {
            init_settle_ms: 0,
            status_delay_ms: 0,
            command_gap_ms: 0,
            ..Self::default()
        }
    }
}
