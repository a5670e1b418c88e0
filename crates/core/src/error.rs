//! Error types for open-h80i-core.

use crate::session::SessionState;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No device with the requested identifiers is present, or it could not be opened.
    #[error("device not found: VID=0x{vendor_id:04X} PID=0x{product_id:04X}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The kernel driver bound to the control interface refused to detach.
    #[error("failed to detach kernel driver: {0}")]
    DriverDetachFailed(String),

    /// The control interface could not be claimed.
    #[error("failed to claim interface: {0}")]
    InterfaceClaimFailed(String),

    /// USB transfer failure (timeout, I/O, disconnect, permissions).
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// Payload does not fit in a command frame after the opcode byte.
    #[error("payload too large: {len} bytes (maximum {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Operation attempted while the session is not in a state that allows it.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A response frame carried fewer bytes than the decoder needs.
    #[error("short response: got {got} bytes, need at least {needed}")]
    ShortResponse { got: usize, needed: usize },

    /// Configuration or profile file problem.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a transport-level failure.
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    /// The underlying message, without this error's own prefix for transport failures.
    pub fn into_detail(self) -> String {
        match self {
            Self::Transport { detail } => detail,
            other => other.to_string(),
        }
    }
}

impl From<rusb::Error> for Error {
    fn from(e: rusb::Error) -> Self {
        Self::transport(format!("{e} ({e:?})"))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
