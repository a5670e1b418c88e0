//! Integration tests: exercise the full flow using a simulated H80i V2.
//!
//! These tests drive a mock device through open → initialize → commands →
//! close and check every frame that crosses the transport boundary.

#[cfg(test)]
mod tests {
    use crate::commands;
    use crate::comm::ErrorClass;
    use crate::config::SessionConfig;
    use crate::device::LedMode;
    use crate::error::Error;
    use crate::frame::FRAME_LEN;
    use crate::profile::{self, Profile};
    use crate::session::{BestEffort, DeviceSession, SessionState};
    use crate::transport::mock::{MockDevice, MockOp, MockTransport};
    use crate::{pids, CORSAIR_VID};

    fn status_reply(temp: u8, tenths: u8, pump: u16, fan1: u16, fan2: u16) -> Vec<u8> {
        let mut reply = vec![0u8; FRAME_LEN];
        reply[0] = 0x01;
        reply[1] = temp;
        reply[2] = tenths;
        reply[3..5].copy_from_slice(&pump.to_be_bytes());
        reply[5..7].copy_from_slice(&fan1.to_be_bytes());
        reply[7..9].copy_from_slice(&fan2.to_be_bytes());
        reply
    }

    fn open_active(dev: &MockDevice) -> DeviceSession<MockDevice> {
        let transport = MockTransport::new(dev.clone());
        let mut session =
            DeviceSession::open_with_config(&transport, SessionConfig::without_delays()).unwrap();
        session.initialize().unwrap();
        session
    }

    /// Test: open → initialize → clamped fan write.
    #[test]
    fn fan_write_is_clamped_end_to_end() {
        let dev = MockDevice::new();
        let mut session = open_active(&dev);

        commands::set_fan_speed(&mut session, 0, 150).unwrap();

        let writes = dev.writes();
        assert_eq!(writes.len(), 2); // init + fan
        assert_eq!(writes[0], vec![0u8; FRAME_LEN]);
        assert_eq!(writes[1][0], 0x12);
        assert_eq!(&writes[1][1..3], &[0, 100]);
    }

    /// Test: LED command frame layout.
    #[test]
    fn led_blue_pulse_end_to_end() {
        let dev = MockDevice::new();
        let mut session = open_active(&dev);

        commands::set_led(&mut session, LedMode::Pulse, 0, 0, 255).unwrap();

        let led = dev.writes().pop().unwrap();
        assert_eq!(led.len(), FRAME_LEN);
        assert_eq!(led[0], 0x23);
        assert_eq!(&led[1..5], &[LedMode::Pulse.code(), 0, 0, 255]);
        assert!(led[5..].iter().all(|&b| b == 0));
    }

    /// Test: the full demonstration sequence with a detached kernel driver.
    #[test]
    fn demo_sequence() {
        let dev = MockDevice::with_kernel_driver();
        dev.queue_response(&status_reply(28, 5, 2100, 900, 910));
        dev.queue_response(&status_reply(27, 9, 2400, 1100, 1105));

        let mut session = open_active(&dev);

        let before = commands::get_status(&mut session).unwrap();
        assert_eq!(before.pump_rpm, 2100);
        assert!((before.liquid_temp_c - 28.5).abs() < 1e-4);

        profile::apply_profile(&mut session, &Profile::default()).unwrap();

        let after = commands::get_status(&mut session).unwrap();
        assert_eq!(after.pump_rpm, 2400);
        assert_eq!(after.fan2_rpm, 1105);

        let report = session.close();
        assert!(matches!(report.release, BestEffort::Done));
        assert!(matches!(report.reattach, BestEffort::Done));
        assert!(dev.state().driver_active);

        let opcodes: Vec<u8> = dev.writes().iter().map(|w| w[0]).collect();
        assert_eq!(opcodes, vec![0x00, 0x01, 0x13, 0x12, 0x12, 0x23, 0x01]);
    }

    /// Test: a failed command leaves the session usable.
    #[test]
    fn transient_failure_then_recovery() {
        let dev = MockDevice::new();
        let mut session = open_active(&dev);

        dev.state().fail_write = true;
        let err = commands::set_pump_speed(&mut session, 80).unwrap_err();
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Transient);
        assert_eq!(session.state(), SessionState::Active);

        dev.state().fail_write = false;
        assert_eq!(commands::set_pump_speed(&mut session, 80).unwrap().get(), 80);
    }

    /// Test: after close nothing reaches the transport.
    #[test]
    fn closed_session_is_terminal() {
        let dev = MockDevice::new();
        let mut session = open_active(&dev);
        session.close();
        dev.clear_ops();

        let err = commands::set_led(&mut session, LedMode::Static, 1, 2, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: SessionState::Closed,
                ..
            }
        ));
        session.close();
        assert!(dev.ops().is_empty());
    }

    /// Test: claim failure unwinds the detach before reporting.
    #[test]
    fn failed_open_leaves_driver_bound() {
        let dev = MockDevice::with_kernel_driver();
        dev.state().fail_claim = true;
        let transport = MockTransport::new(dev.clone());

        let result = DeviceSession::open(&transport, CORSAIR_VID, pids::H80I_V2);
        assert!(matches!(result, Err(Error::InterfaceClaimFailed(_))));
        assert_eq!(
            dev.ops(),
            vec![
                MockOp::KernelDriverActive(0),
                MockOp::Detach(0),
                MockOp::Claim(0),
                MockOp::Attach(0),
            ]
        );
        assert!(dev.state().driver_active);
    }
}
