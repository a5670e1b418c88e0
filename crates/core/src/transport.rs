//! USB transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real USB devices and
//! mock devices share the same interface. The session layer consumes these
//! traits and never talks to libusb directly.

use crate::error::Result;
use std::time::Duration;

/// A transport context that can open device handles by identifier.
///
/// Owned by the caller; dropping it tears the context down.
pub trait UsbTransport {
    type Handle: UsbHandle;

    /// Open the first device matching the identifiers.
    ///
    /// Fails with `DeviceNotFound` when no device matches or it cannot be opened.
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Self::Handle>;
}

/// An open device handle. Dropping the handle closes it.
pub trait UsbHandle {
    /// Whether a kernel driver is bound to the interface.
    fn kernel_driver_active(&mut self, iface: u8) -> Result<bool>;

    fn detach_kernel_driver(&mut self, iface: u8) -> Result<()>;

    fn attach_kernel_driver(&mut self, iface: u8) -> Result<()>;

    fn claim_interface(&mut self, iface: u8) -> Result<()>;

    fn release_interface(&mut self, iface: u8) -> Result<()>;

    /// Blocking interrupt OUT transfer. Returns bytes written.
    fn write_interrupt(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Blocking interrupt IN transfer. Returns bytes read.
    fn read_interrupt(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> Result<usize>;
}
