//! libusb-backed transport via `rusb`.
//!
//! `RusbTransport` owns an explicit libusb context. Creating it initializes
//! libusb; dropping it (after every handle opened from it) tears it down.

use crate::device::{CoolerModel, DeviceInfo};
use crate::error::{Error, Result};
use crate::transport::{UsbHandle, UsbTransport};
use crate::CORSAIR_VID;
use rusb::UsbContext;
use std::time::Duration;
use tracing::{debug, info};

/// Transport context backed by libusb.
pub struct RusbTransport {
    context: rusb::Context,
}

impl RusbTransport {
    /// Initialize a libusb context.
    pub fn new() -> Result<Self> {
        let context = rusb::Context::new()?;
        Ok(Self { context })
    }

    /// Turn libusb's own debug output on or off.
    pub fn set_debug_logging(&mut self, enabled: bool) {
        let level = if enabled {
            rusb::LogLevel::Debug
        } else {
            rusb::LogLevel::Warning
        };
        self.context.set_log_level(level);
    }

    /// Enumerate connected Corsair coolers of known models.
    pub fn discover_devices(&self) -> Result<Vec<DeviceInfo>> {
        debug!("Starting USB device enumeration");
        let mut devices = Vec::new();

        for device in self.context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(e) => {
                    debug!(error = %e, "Skipping device with unreadable descriptor");
                    continue;
                }
            };
            if desc.vendor_id() != CORSAIR_VID {
                continue;
            }

            if let Some(model) = CoolerModel::from_pid(desc.product_id()) {
                info!(
                    model = model.name(),
                    vid = format_args!("0x{:04X}", desc.vendor_id()),
                    pid = format_args!("0x{:04X}", desc.product_id()),
                    bus = device.bus_number(),
                    address = device.address(),
                    "Found Corsair cooler"
                );
                devices.push(DeviceInfo {
                    model,
                    vid: desc.vendor_id(),
                    pid: desc.product_id(),
                    bus: device.bus_number(),
                    address: device.address(),
                });
            }
        }

        debug!(count = devices.len(), "Device enumeration complete");
        Ok(devices)
    }
}

impl UsbTransport for RusbTransport {
    type Handle = RusbHandle;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<RusbHandle> {
        self.context
            .open_device_with_vid_pid(vendor_id, product_id)
            .map(|handle| RusbHandle { handle })
            .ok_or(Error::DeviceNotFound {
                vendor_id,
                product_id,
            })
    }
}

/// Open libusb device handle. Dropping it closes the device.
pub struct RusbHandle {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl UsbHandle for RusbHandle {
    fn kernel_driver_active(&mut self, iface: u8) -> Result<bool> {
        Ok(self.handle.kernel_driver_active(iface)?)
    }

    fn detach_kernel_driver(&mut self, iface: u8) -> Result<()> {
        Ok(self.handle.detach_kernel_driver(iface)?)
    }

    fn attach_kernel_driver(&mut self, iface: u8) -> Result<()> {
        Ok(self.handle.attach_kernel_driver(iface)?)
    }

    fn claim_interface(&mut self, iface: u8) -> Result<()> {
        Ok(self.handle.claim_interface(iface)?)
    }

    fn release_interface(&mut self, iface: u8) -> Result<()> {
        Ok(self.handle.release_interface(iface)?)
    }

    fn write_interrupt(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        Ok(self.handle.write_interrupt(endpoint, data, timeout)?)
    }

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        Ok(self.handle.read_interrupt(endpoint, buf, timeout)?)
    }
}
