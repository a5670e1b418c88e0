//! Error classification for callers deciding whether to abort or continue.
//!
//! The core never retries. Callers driving a sequence of commands use
//! `ErrorClass` to tell a dead device from a one-off failure.

use crate::error::Error;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout or busy endpoint; a later command may succeed.
    Transient,
    /// Device is gone; stop issuing commands.
    Disconnected,
    /// Missing udev rule or another process owns the device.
    PermissionDenied,
    /// Bad or truncated response data.
    Protocol,
    /// Caller misuse: wrong session state, oversized payload, bad config.
    Usage,
}

impl ErrorClass {
    /// Classify an error.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::DeviceNotFound { .. } => Self::Disconnected,
            Error::DriverDetachFailed(msg)
            | Error::InterfaceClaimFailed(msg)
            | Error::Transport { detail: msg } => Self::from_detail(msg),
            Error::ShortResponse { .. } => Self::Protocol,
            Error::PayloadTooLarge { .. } | Error::InvalidState { .. } | Error::Config(_) => {
                Self::Usage
            }
        }
    }

    fn from_detail(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("no device") || lower.contains("nodevice") || lower.contains("disconnect")
        {
            Self::Disconnected
        } else if lower.contains("access") || lower.contains("permission") {
            Self::PermissionDenied
        } else if lower.contains("busy") {
            // Another driver or process holds the interface.
            Self::PermissionDenied
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Transient
        } else {
            Self::Protocol
        }
    }

    /// Whether a command sequence should stop after this error.
    pub fn should_abort(&self) -> bool {
        matches!(self, Self::Disconnected | Self::PermissionDenied)
    }
}
