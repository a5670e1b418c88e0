//! Fixed-size command and response frames for the H80i V2 interrupt endpoints.
//!
//! Every frame, in both directions, is exactly 64 bytes:
//! - byte 0: opcode
//! - bytes 1..N: opcode-specific payload
//! - remaining bytes: zero padding
//!
//! Response decoding is driven by a layout table (`STATUS_LAYOUT`) so that
//! field offsets can be corrected in one place. The layout follows observed
//! device behaviour, not vendor documentation.

use crate::error::{Error, Result};
use serde::Serialize;

/// Size of every frame exchanged with the device.
pub const FRAME_LEN: usize = 64;
/// Largest payload that fits after the opcode byte.
pub const MAX_PAYLOAD_LEN: usize = FRAME_LEN - 1;

/// Command opcodes understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Init = 0x00,
    GetStatus = 0x01,
    SetFan = 0x12,
    SetPump = 0x13,
    SetLed = 0x23,
}

impl Opcode {
    /// Wire value of this opcode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Longest payload each command carries.
    ///
    /// - SetPump: percent
    /// - SetFan: fan index, percent
    /// - SetLed: mode, R, G, B
    pub fn payload_len(self) -> usize {
        match self {
            Self::Init | Self::GetStatus => 0,
            Self::SetPump => 1,
            Self::SetFan => 2,
            Self::SetLed => 4,
        }
    }
}

/// An outbound 64-byte command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Raw bytes as written to the OUT endpoint.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// Everything after the opcode byte, padding included.
    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }
}

/// Build a command frame from an opcode and payload.
///
/// The frame is zero-filled, the opcode written at offset 0, and the payload
/// copied from offset 1.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Result<CommandFrame> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = [0u8; FRAME_LEN];
    buf[0] = opcode.code();
    buf[1..1 + payload.len()].copy_from_slice(payload);
    Ok(CommandFrame(buf))
}

/// An inbound frame together with the number of bytes the transfer delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    bytes: [u8; FRAME_LEN],
    transferred: usize,
}

impl ResponseFrame {
    /// Wrap a raw read buffer. `transferred` is capped at the frame size.
    pub fn new(bytes: [u8; FRAME_LEN], transferred: usize) -> Self {
        Self {
            bytes,
            transferred: transferred.min(FRAME_LEN),
        }
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Bytes actually delivered by the device.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Whether the device delivered less than a full frame.
    pub fn is_short(&self) -> bool {
        self.transferred < FRAME_LEN
    }
}

/// How a field's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// Single unsigned byte.
    U8,
    /// Two bytes, most significant first.
    U16Be,
}

impl FieldEncoding {
    /// Number of bytes the field occupies.
    pub fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16Be => 2,
        }
    }
}

/// Which status value a layout entry feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    /// Whole degrees Celsius.
    TempWhole,
    /// Tenths of a degree.
    TempTenths,
    PumpRpm,
    Fan1Rpm,
    Fan2Rpm,
}

/// One entry of a response layout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: StatusField,
    pub offset: usize,
    pub encoding: FieldEncoding,
}

impl FieldSpec {
    const fn new(field: StatusField, offset: usize, encoding: FieldEncoding) -> Self {
        Self {
            field,
            offset,
            encoding,
        }
    }

    /// One past the last byte this field reads.
    pub fn end(&self) -> usize {
        self.offset + self.encoding.width()
    }

    /// Read the field from a frame. Fields outside the buffer read as zero.
    pub fn read(&self, bytes: &[u8]) -> u16 {
        match bytes.get(self.offset..self.end()) {
            Some([b]) => *b as u16,
            Some([hi, lo]) => ((*hi as u16) << 8) | (*lo as u16),
            _ => 0,
        }
    }
}

/// Status response layout (unverified against vendor documentation).
pub const STATUS_LAYOUT: &[FieldSpec] = &[
    FieldSpec::new(StatusField::TempWhole, 1, FieldEncoding::U8),
    FieldSpec::new(StatusField::TempTenths, 2, FieldEncoding::U8),
    FieldSpec::new(StatusField::PumpRpm, 3, FieldEncoding::U16Be),
    FieldSpec::new(StatusField::Fan1Rpm, 5, FieldEncoding::U16Be),
    FieldSpec::new(StatusField::Fan2Rpm, 7, FieldEncoding::U16Be),
];

/// Response layout for an opcode. Empty when the device answers with no data.
pub fn response_layout(opcode: Opcode) -> &'static [FieldSpec] {
    match opcode {
        Opcode::GetStatus => STATUS_LAYOUT,
        _ => &[],
    }
}

/// Number of leading bytes a layout needs to decode fully.
pub fn layout_extent(layout: &[FieldSpec]) -> usize {
    layout.iter().map(FieldSpec::end).max().unwrap_or(0)
}

/// Decoded status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// Liquid temperature in degrees Celsius.
    pub liquid_temp_c: f32,
    pub pump_rpm: u16,
    pub fan1_rpm: u16,
    pub fan2_rpm: u16,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Liquid Temperature: {:.1}°C", self.liquid_temp_c)?;
        writeln!(f, "Pump Speed: {} RPM", self.pump_rpm)?;
        writeln!(f, "Fan 1 Speed: {} RPM", self.fan1_rpm)?;
        write!(f, "Fan 2 Speed: {} RPM", self.fan2_rpm)
    }
}

/// Decode a status response using the default layout.
///
/// Pure function of the frame bytes. If the device answered with an
/// unrelated frame the result is meaningless.
pub fn decode_status(frame: &ResponseFrame) -> StatusReport {
    decode_status_with(frame, response_layout(Opcode::GetStatus))
}

/// Decode a status response using a caller-supplied layout.
pub fn decode_status_with(frame: &ResponseFrame, layout: &[FieldSpec]) -> StatusReport {
    let bytes = frame.as_bytes();
    let mut whole = 0u16;
    let mut tenths = 0u16;
    let mut report = StatusReport::default();

    for spec in layout {
        let value = spec.read(bytes);
        match spec.field {
            StatusField::TempWhole => whole = value,
            StatusField::TempTenths => tenths = value,
            StatusField::PumpRpm => report.pump_rpm = value,
            StatusField::Fan1Rpm => report.fan1_rpm = value,
            StatusField::Fan2Rpm => report.fan2_rpm = value,
        }
    }

    report.liquid_temp_c = whole as f32 + tenths as f32 / 10.0;
    report
}
