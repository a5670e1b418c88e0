//! Device session: exclusive ownership of one cooler and its control interface.
//!
//! State machine:
//!
//! ```text
//! open() ──► Uninitialized ──initialize()──► Active
//!                 │                            │
//!                 └──────────close()───────────┴──► Closed (terminal)
//! ```
//!
//! `send`/`receive` are only valid while `Active`. Nothing here retries;
//! every failure is returned to the caller.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::{self, CommandFrame, Opcode, ResponseFrame, FRAME_LEN};
use crate::transport::{UsbHandle, UsbTransport};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of a best-effort cleanup step. Failures are logged, never returned as errors.
#[derive(Debug)]
pub enum BestEffort {
    /// Step did not apply.
    Skipped,
    Done,
    Failed(Error),
}

impl BestEffort {
    fn from_result(step: &'static str, result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => {
                warn!(step, error = %e, "Best-effort cleanup step failed");
                Self::Failed(e)
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What `close()` did.
#[derive(Debug)]
pub struct CloseReport {
    /// Interface release.
    pub release: BestEffort,
    /// Kernel driver reattach; `Skipped` when nothing was detached.
    pub reattach: BestEffort,
}

impl CloseReport {
    fn skipped() -> Self {
        Self {
            release: BestEffort::Skipped,
            reattach: BestEffort::Skipped,
        }
    }
}

/// An exclusive session with one device.
///
/// The session owns the handle; all operations take `&mut self`, so sharing
/// across threads requires an external lock around the whole session.
pub struct DeviceSession<H: UsbHandle> {
    handle: Option<H>,
    state: SessionState,
    driver_detached: bool,
    buffer: [u8; FRAME_LEN],
    config: SessionConfig,
    last_transfer: Option<Instant>,
}

impl<H: UsbHandle> DeviceSession<H> {
    /// Open a device with default settings.
    pub fn open<T>(transport: &T, vendor_id: u16, product_id: u16) -> Result<Self>
    where
        T: UsbTransport<Handle = H>,
    {
        Self::open_with_config(transport, SessionConfig::for_device(vendor_id, product_id))
    }

    /// Open the device named by `config`, detach any kernel driver, and claim the interface.
    ///
    /// On failure nothing stays claimed or detached.
    pub fn open_with_config<T>(transport: &T, config: SessionConfig) -> Result<Self>
    where
        T: UsbTransport<Handle = H>,
    {
        config.validate()?;
        let mut handle = transport.open(config.vendor_id, config.product_id)?;
        let iface = config.interface;

        // Platforms without driver queries behave as if nothing is bound.
        let driver_active = handle.kernel_driver_active(iface).unwrap_or_else(|e| {
            debug!(error = %e, "Kernel driver query failed, assuming none bound");
            false
        });

        if driver_active {
            debug!(iface, "Kernel driver active, detaching");
            handle
                .detach_kernel_driver(iface)
                .map_err(|e| Error::DriverDetachFailed(e.into_detail()))?;
        }

        if let Err(e) = handle.claim_interface(iface) {
            if driver_active {
                if let Err(reattach) = handle.attach_kernel_driver(iface) {
                    warn!(error = %reattach, "Kernel driver reattach failed after claim failure");
                }
            }
            return Err(Error::InterfaceClaimFailed(e.into_detail()));
        }

        info!(
            vid = format_args!("0x{:04X}", config.vendor_id),
            pid = format_args!("0x{:04X}", config.product_id),
            iface,
            "Device opened"
        );

        Ok(Self {
            handle: Some(handle),
            state: SessionState::Uninitialized,
            driver_detached: driver_active,
            buffer: [0u8; FRAME_LEN],
            config,
            last_transfer: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Send the init frame and wait for the device to settle.
    ///
    /// The session becomes `Active` only if the write succeeds.
    pub fn initialize(&mut self) -> Result<()> {
        self.require(SessionState::Uninitialized, "initialize")?;

        let frame = frame::encode(Opcode::Init, &[])?;
        self.write_frame(&frame, "initialize")?;
        std::thread::sleep(self.config.init_settle());

        self.state = SessionState::Active;
        debug!("Session active");
        Ok(())
    }

    /// Encode and write one command frame.
    ///
    /// The payload may not be longer than the opcode carries.
    pub fn send(&mut self, opcode: Opcode, payload: &[u8]) -> Result<()> {
        self.require(SessionState::Active, "send")?;
        let max = opcode.payload_len();
        if payload.len() > max {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }
        let frame = frame::encode(opcode, payload)?;
        self.wait_command_gap();
        self.write_frame(&frame, "send")
    }

    /// Read one response frame.
    ///
    /// The returned frame carries the transferred byte count; short reads are
    /// not padded into full frames silently.
    pub fn receive(&mut self) -> Result<ResponseFrame> {
        self.require(SessionState::Active, "receive")?;

        let endpoint = self.config.endpoint_in;
        let timeout = self.config.transfer_timeout();
        let state = self.state;
        let handle = self.handle.as_mut().ok_or(Error::InvalidState {
            operation: "receive",
            state,
        })?;
        self.buffer.fill(0);
        let n = handle.read_interrupt(endpoint, &mut self.buffer, timeout)?;
        self.last_transfer = Some(Instant::now());

        trace!(
            transferred = n,
            frame_hex = format_args!("{:02X?}", &self.buffer[..n.min(FRAME_LEN)]),
            "RX"
        );
        if n < FRAME_LEN {
            debug!(transferred = n, "Short read from device");
        }
        Ok(ResponseFrame::new(self.buffer, n))
    }

    /// Release the interface, reattach the kernel driver if it was detached, and close the handle.
    ///
    /// Idempotent. Cleanup failures are logged and reported, never returned as errors.
    pub fn close(&mut self) -> CloseReport {
        let Some(mut handle) = self.handle.take() else {
            self.state = SessionState::Closed;
            return CloseReport::skipped();
        };
        let iface = self.config.interface;

        let release = BestEffort::from_result("release", handle.release_interface(iface));
        let reattach = if self.driver_detached {
            self.driver_detached = false;
            BestEffort::from_result("reattach", handle.attach_kernel_driver(iface))
        } else {
            BestEffort::Skipped
        };
        drop(handle);

        self.state = SessionState::Closed;
        debug!("Session closed");
        CloseReport { release, reattach }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn handle_mut(&mut self, operation: &'static str) -> Result<&mut H> {
        let state = self.state;
        self.handle
            .as_mut()
            .ok_or(Error::InvalidState { operation, state })
    }

    fn wait_command_gap(&self) {
        let gap = self.config.command_gap();
        if let Some(last) = self.last_transfer {
            let elapsed = last.elapsed();
            if elapsed < gap {
                std::thread::sleep(gap - elapsed);
            }
        }
    }

    fn write_frame(&mut self, frame: &CommandFrame, operation: &'static str) -> Result<()> {
        let endpoint = self.config.endpoint_out;
        let timeout = self.config.transfer_timeout();
        trace!(
            opcode = format_args!("0x{:02X}", frame.opcode()),
            frame_hex = format_args!("{:02X?}", &frame.as_bytes()[..]),
            "TX"
        );
        let handle = self.handle_mut(operation)?;
        let n = handle.write_interrupt(endpoint, frame.as_bytes(), timeout)?;
        self.last_transfer = Some(Instant::now());
        if n != FRAME_LEN {
            return Err(Error::transport(format!(
                "short write during {operation}: {n} of {FRAME_LEN} bytes"
            )));
        }
        Ok(())
    }
}

impl<H: UsbHandle> Drop for DeviceSession<H> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockDevice, MockOp, MockTransport};

    fn open_mock(dev: &MockDevice) -> DeviceSession<MockDevice> {
        let transport = MockTransport::new(dev.clone());
        DeviceSession::open_with_config(&transport, SessionConfig::without_delays()).unwrap()
    }

    fn active_mock(dev: &MockDevice) -> DeviceSession<MockDevice> {
        let mut session = open_mock(dev);
        session.initialize().unwrap();
        dev.clear_ops();
        session
    }

    #[test]
    fn open_claims_interface_without_driver() {
        let dev = MockDevice::new();
        let session = open_mock(&dev);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(
            dev.ops(),
            vec![MockOp::KernelDriverActive(0), MockOp::Claim(0)]
        );
    }

    #[test]
    fn open_detaches_active_kernel_driver() {
        let dev = MockDevice::with_kernel_driver();
        let _session = open_mock(&dev);
        assert_eq!(
            dev.ops(),
            vec![
                MockOp::KernelDriverActive(0),
                MockOp::Detach(0),
                MockOp::Claim(0)
            ]
        );
    }

    #[test]
    fn open_missing_device_fails() {
        let transport = MockTransport::empty();
        let result = DeviceSession::open(&transport, 0x1B1C, 0x0C12);
        assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
    }

    #[test]
    fn open_reports_refused_detach() {
        let dev = MockDevice::with_kernel_driver();
        dev.state().fail_detach = true;
        let transport = MockTransport::new(dev.clone());
        let result = DeviceSession::open_with_config(&transport, SessionConfig::without_delays());
        assert!(matches!(result, Err(Error::DriverDetachFailed(_))));
        assert!(!dev.ops().contains(&MockOp::Claim(0)));
    }

    #[test]
    fn failed_claim_reattaches_detached_driver() {
        let dev = MockDevice::with_kernel_driver();
        dev.state().fail_claim = true;
        let transport = MockTransport::new(dev.clone());
        let result = DeviceSession::open_with_config(&transport, SessionConfig::without_delays());
        assert!(matches!(result, Err(Error::InterfaceClaimFailed(_))));
        assert_eq!(dev.ops().last(), Some(&MockOp::Attach(0)));
        assert!(dev.state().driver_active);
    }

    #[test]
    fn open_errors_carry_transport_detail_once() {
        let dev = MockDevice::with_kernel_driver();
        dev.state().fail_detach = true;
        let transport = MockTransport::new(dev.clone());
        let err = DeviceSession::open_with_config(&transport, SessionConfig::without_delays())
            .err()
            .expect("detach refused");
        assert!(matches!(&err, Error::DriverDetachFailed(d) if d == "mock: detach refused (Busy)"));
        assert!(!err.to_string().contains("transport error"));

        let dev = MockDevice::new();
        dev.state().fail_claim = true;
        let transport = MockTransport::new(dev.clone());
        let err = DeviceSession::open_with_config(&transport, SessionConfig::without_delays())
            .err()
            .expect("claim refused");
        assert_eq!(
            err.to_string(),
            "failed to claim interface: mock: claim failed (Access)"
        );
    }

    #[test]
    fn failed_claim_and_reattach_still_reports_claim_failure() {
        let dev = MockDevice::with_kernel_driver();
        dev.state().fail_claim = true;
        dev.state().fail_attach = true;
        let transport = MockTransport::new(dev.clone());
        let result = DeviceSession::open_with_config(&transport, SessionConfig::without_delays());
        assert!(matches!(result, Err(Error::InterfaceClaimFailed(_))));
        assert_eq!(dev.ops().last(), Some(&MockOp::Attach(0)));
    }

    #[test]
    fn open_rejects_zero_transfer_timeout_before_io() {
        let dev = MockDevice::new();
        let transport = MockTransport::new(dev.clone());
        let config = SessionConfig {
            transfer_timeout_ms: 0,
            ..SessionConfig::without_delays()
        };
        let result = DeviceSession::open_with_config(&transport, config);
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn failed_claim_without_driver_does_not_attach() {
        let dev = MockDevice::new();
        dev.state().fail_claim = true;
        let transport = MockTransport::new(dev.clone());
        let result = DeviceSession::open_with_config(&transport, SessionConfig::without_delays());
        assert!(matches!(result, Err(Error::InterfaceClaimFailed(_))));
        assert!(!dev.ops().contains(&MockOp::Attach(0)));
    }

    #[test]
    fn initialize_writes_init_frame_and_activates() {
        let dev = MockDevice::new();
        let mut session = open_mock(&dev);
        dev.clear_ops();

        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let writes = dev.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], vec![0u8; FRAME_LEN]);
        assert!(matches!(
            dev.ops()[0],
            MockOp::Write { endpoint: 0x02, .. }
        ));
    }

    #[test]
    fn failed_initialize_stays_uninitialized() {
        let dev = MockDevice::new();
        let mut session = open_mock(&dev);
        dev.state().fail_write = true;

        assert!(matches!(
            session.initialize(),
            Err(Error::Transport { .. })
        ));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn short_init_write_stays_uninitialized() {
        let dev = MockDevice::new();
        let mut session = open_mock(&dev);
        dev.state().short_write = Some(32);

        let err = session.initialize().unwrap_err();
        assert!(matches!(&err, Error::Transport { detail } if detail.contains("initialize")));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn initialize_twice_is_invalid() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        assert!(matches!(
            session.initialize(),
            Err(Error::InvalidState { .. })
        ));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn uninitialized_session_rejects_io_without_transport_calls() {
        let dev = MockDevice::new();
        let mut session = open_mock(&dev);
        dev.clear_ops();

        assert!(matches!(
            session.send(Opcode::SetPump, &[50]),
            Err(Error::InvalidState {
                operation: "send",
                state: SessionState::Uninitialized
            })
        ));
        assert!(matches!(
            session.receive(),
            Err(Error::InvalidState {
                operation: "receive",
                ..
            })
        ));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn closed_session_rejects_io_without_transport_calls() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        session.close();
        dev.clear_ops();

        assert!(matches!(
            session.send(Opcode::GetStatus, &[]),
            Err(Error::InvalidState {
                state: SessionState::Closed,
                ..
            })
        ));
        assert!(matches!(
            session.receive(),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            session.initialize(),
            Err(Error::InvalidState { .. })
        ));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn send_writes_encoded_frame() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);

        session.send(Opcode::SetPump, &[70]).unwrap();
        let writes = dev.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), FRAME_LEN);
        assert_eq!(writes[0][0], 0x13);
        assert_eq!(writes[0][1], 70);
    }

    #[test]
    fn send_oversized_payload_does_no_io() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        let result = session.send(Opcode::SetLed, &[0u8; 64]);
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn send_rejects_payload_longer_than_opcode_carries() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);

        assert!(matches!(
            session.send(Opcode::SetPump, &[50, 0]),
            Err(Error::PayloadTooLarge { len: 2, max: 1 })
        ));
        assert!(matches!(
            session.send(Opcode::GetStatus, &[1]),
            Err(Error::PayloadTooLarge { len: 1, max: 0 })
        ));
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn short_write_is_transport_error() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        dev.state().short_write = Some(8);

        let err = session.send(Opcode::SetPump, &[40]).unwrap_err();
        assert!(matches!(&err, Error::Transport { detail } if detail.contains("8 of 64")));
        assert_eq!(session.state(), SessionState::Active);

        dev.state().short_write = None;
        assert!(session.send(Opcode::SetPump, &[40]).is_ok());
    }

    #[test]
    fn send_failure_keeps_session_active() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        dev.state().fail_write = true;

        assert!(matches!(
            session.send(Opcode::SetPump, &[10]),
            Err(Error::Transport { .. })
        ));
        assert_eq!(session.state(), SessionState::Active);

        dev.state().fail_write = false;
        assert!(session.send(Opcode::SetPump, &[10]).is_ok());
    }

    #[test]
    fn receive_returns_full_frame() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        let mut report = vec![0u8; FRAME_LEN];
        report[0] = 0x01;
        report[1] = 27;
        dev.queue_response(&report);

        let frame = session.receive().unwrap();
        assert_eq!(frame.transferred(), FRAME_LEN);
        assert!(!frame.is_short());
        assert_eq!(frame.as_bytes()[1], 27);
        assert_eq!(dev.ops(), vec![MockOp::Read { endpoint: 0x81 }]);
    }

    #[test]
    fn receive_surfaces_short_read() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        dev.queue_response(&[0x01, 0x19, 0x03]);

        let frame = session.receive().unwrap();
        assert!(frame.is_short());
        assert_eq!(frame.transferred(), 3);
        assert!(frame.as_bytes()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn receive_timeout_is_transport_error() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);
        assert!(matches!(
            session.receive(),
            Err(Error::Transport { .. })
        ));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn close_releases_and_reattaches() {
        let dev = MockDevice::with_kernel_driver();
        let mut session = active_mock(&dev);

        let report = session.close();
        assert!(matches!(report.release, BestEffort::Done));
        assert!(matches!(report.reattach, BestEffort::Done));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(dev.ops(), vec![MockOp::Release(0), MockOp::Attach(0)]);
    }

    #[test]
    fn close_without_detached_driver_skips_reattach() {
        let dev = MockDevice::new();
        let mut session = active_mock(&dev);

        let report = session.close();
        assert!(matches!(report.reattach, BestEffort::Skipped));
        assert_eq!(dev.ops(), vec![MockOp::Release(0)]);
    }

    #[test]
    fn close_swallows_reattach_failure() {
        let dev = MockDevice::with_kernel_driver();
        let mut session = active_mock(&dev);
        dev.state().fail_attach = true;

        let report = session.close();
        assert!(report.reattach.is_failed());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_swallows_release_failure() {
        let dev = MockDevice::with_kernel_driver();
        let mut session = active_mock(&dev);
        dev.state().fail_release = true;

        let report = session.close();
        assert!(report.release.is_failed());
        assert!(matches!(report.reattach, BestEffort::Done));
        assert_eq!(dev.ops(), vec![MockOp::Release(0), MockOp::Attach(0)]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_twice_is_idempotent() {
        let dev = MockDevice::with_kernel_driver();
        let mut session = active_mock(&dev);
        session.close();
        dev.clear_ops();

        let report = session.close();
        assert!(matches!(report.release, BestEffort::Skipped));
        assert!(matches!(report.reattach, BestEffort::Skipped));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(dev.ops().is_empty());
    }

    #[test]
    fn close_from_uninitialized() {
        let dev = MockDevice::new();
        let mut session = open_mock(&dev);
        dev.clear_ops();

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(dev.ops(), vec![MockOp::Release(0)]);
    }

    #[test]
    fn drop_closes_open_session() {
        let dev = MockDevice::with_kernel_driver();
        {
            let _session = active_mock(&dev);
        }
        assert_eq!(dev.ops(), vec![MockOp::Release(0), MockOp::Attach(0)]);
    }

    #[test]
    fn command_gap_spaces_consecutive_sends() {
        let dev = MockDevice::new();
        let transport = MockTransport::new(dev.clone());
        let config = SessionConfig {
            command_gap_ms: 20,
            ..SessionConfig::without_delays()
        };
        let mut session = DeviceSession::open_with_config(&transport, config).unwrap();
        session.initialize().unwrap();

        let start = Instant::now();
        session.send(Opcode::SetPump, &[50]).unwrap();
        session.send(Opcode::SetPump, &[60]).unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    }
}
