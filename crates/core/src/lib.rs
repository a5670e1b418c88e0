//! open-h80i-core: frame codec, device session, and cooler commands.
//!
//! This crate provides the core logic for controlling Corsair H80i V2
//! liquid coolers over 64-byte USB interrupt transfers.

pub mod comm;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
#[cfg(test)]
mod integration_tests;
pub mod profile;
pub mod safety;
pub mod session;
pub mod transport;
pub mod usb;

/// Corsair USB Vendor ID.
pub const CORSAIR_VID: u16 = 0x1B1C;

/// Known H80i V2 product IDs.
pub mod pids {
    /// H80i V2, as observed on the reference unit.
    pub const H80I_V2: u16 = 0x0C12;
    /// Alternate value seen elsewhere; not confirmed against hardware.
    pub const H80I_V2_ALT: u16 = 0x0C04;
}
