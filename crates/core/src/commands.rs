//! Cooler commands: pump, fan, LED, and status.
//!
//! Each command encodes one frame and writes it through the session:
//!   - SetPump (0x13): [percent]
//!   - SetFan (0x12): [fan index, percent]
//!   - SetLed (0x23): [mode, R, G, B]
//!   - GetStatus (0x01): no payload; reply decoded with the status layout
//!
//! Percent values are clamped to [0, 100] before encoding.

use crate::device::{LedMode, FAN_COUNT};
use crate::error::{Error, Result};
use crate::frame::{self, Opcode, StatusReport};
use crate::safety::Percent;
use crate::session::DeviceSession;
use crate::transport::UsbHandle;
use tracing::{debug, trace};

/// Set the pump duty cycle. Returns the value actually sent.
pub fn set_pump_speed<H: UsbHandle>(
    session: &mut DeviceSession<H>,
    percent: u8,
) -> Result<Percent> {
    let duty = Percent::new(percent);
    session.send(Opcode::SetPump, &[duty.get()])?;
    debug!(percent = duty.get(), "Pump speed set");
    Ok(duty)
}

/// Set one fan's duty cycle. Returns the value actually sent.
///
/// The fan index is passed through unchecked.
pub fn set_fan_speed<H: UsbHandle>(
    session: &mut DeviceSession<H>,
    fan_index: u8,
    percent: u8,
) -> Result<Percent> {
    let duty = Percent::new(percent);
    session.send(Opcode::SetFan, &[fan_index, duty.get()])?;
    debug!(fan_index, percent = duty.get(), "Fan speed set");
    Ok(duty)
}

/// Set every fan header to the same duty cycle.
pub fn set_all_fans<H: UsbHandle>(session: &mut DeviceSession<H>, percent: u8) -> Result<Percent> {
    for fan_index in 0..FAN_COUNT {
        set_fan_speed(session, fan_index, percent)?;
    }
    Ok(Percent::new(percent))
}

/// Set the LED mode and colour.
pub fn set_led<H: UsbHandle>(
    session: &mut DeviceSession<H>,
    mode: LedMode,
    r: u8,
    g: u8,
    b: u8,
) -> Result<()> {
    session.send(Opcode::SetLed, &[mode.code(), r, g, b])?;
    debug!(mode = %mode, r, g, b, "LED set");
    Ok(())
}

/// Request and decode a status report.
///
/// Steps:
/// 1. Send GetStatus
/// 2. Wait the configured processing delay
/// 3. Read one frame and decode it with the status layout
///
/// Fails with `ShortResponse` if the device delivered fewer bytes than the
/// layout covers.
pub fn get_status<H: UsbHandle>(session: &mut DeviceSession<H>) -> Result<StatusReport> {
    session.send(Opcode::GetStatus, &[])?;
    std::thread::sleep(session.config().status_delay());

    let response = session.receive()?;
    let layout = frame::response_layout(Opcode::GetStatus);
    let needed = frame::layout_extent(layout);
    if response.transferred() < needed {
        return Err(Error::ShortResponse {
            got: response.transferred(),
            needed,
        });
    }

    let echo = response.as_bytes()[0];
    if echo != Opcode::GetStatus.code() {
        trace!(
            echo = format_args!("0x{echo:02X}"),
            "Status reply does not echo the request opcode"
        );
    }

    let report = frame::decode_status_with(&response, layout);
    debug!(
        liquid_temp_c = report.liquid_temp_c,
        pump_rpm = report.pump_rpm,
        fan1_rpm = report.fan1_rpm,
        fan2_rpm = report.fan2_rpm,
        "Status read"
    );
    Ok(report)
}
