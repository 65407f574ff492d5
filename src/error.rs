// src/error.rs
//! Unified error handling for daq-hal
//!
//! Every fallible operation returns a [`DaqError`]; background-thread faults
//! are parked in the scan engine's error slot and surfaced through status
//! queries rather than propagated across thread boundaries.

use thiserror::Error;

/// Fixed length of the buffer returned by [`error_message`]
pub const ERR_MSG_LEN: usize = 512;

/// Unified error type for all DAQ operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DaqError {
    /// Device not connected or connection lost
    #[error("device not connected or connection lost")]
    NotConnected,

    /// A background scan is already in progress on this device
    #[error("a background scan operation is already in progress")]
    AlreadyActive,

    /// Channel/range/mode/trigger/queue argument validation failure
    #[error("invalid argument: {0}")]
    BadArgument(String),

    /// Requested configuration was never calibrated or is unsupported
    #[error("configuration not supported: {0}")]
    ConfigNotSupported(String),

    /// FIFO overrun; data was not transferred from the device fast enough
    #[error("FIFO overrun, data was not transferred from the device fast enough")]
    Overrun,

    /// FIFO underrun; data was not transferred to the device fast enough
    #[error("FIFO underrun, data was not transferred to the device fast enough")]
    Underrun,

    /// Operation timed out
    #[error("operation timed out")]
    TimedOut,

    /// Device firmware is not loaded and could not be brought up
    #[error("device firmware not loaded")]
    NoFirmware,

    /// Firmware bitstream file missing from the firmware directory
    #[error("firmware file not found: {0}")]
    FirmwareFileNotFound(String),

    /// Firmware bitstream file exists but could not be read
    #[error("unable to read firmware file: {0}")]
    FirmwareReadFailure(String),

    /// Unexpected transport or logic fault
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant-only view of [`DaqError`], cheap to copy into status snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    AlreadyActive,
    BadArgument,
    ConfigNotSupported,
    Overrun,
    Underrun,
    TimedOut,
    NoFirmware,
    FirmwareFileNotFound,
    FirmwareReadFailure,
    Internal,
}

impl DaqError {
    /// The error's kind, independent of any message payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaqError::NotConnected => ErrorKind::NotConnected,
            DaqError::AlreadyActive => ErrorKind::AlreadyActive,
            DaqError::BadArgument(_) => ErrorKind::BadArgument,
            DaqError::ConfigNotSupported(_) => ErrorKind::ConfigNotSupported,
            DaqError::Overrun => ErrorKind::Overrun,
            DaqError::Underrun => ErrorKind::Underrun,
            DaqError::TimedOut => ErrorKind::TimedOut,
            DaqError::NoFirmware => ErrorKind::NoFirmware,
            DaqError::FirmwareFileNotFound(_) => ErrorKind::FirmwareFileNotFound,
            DaqError::FirmwareReadFailure(_) => ErrorKind::FirmwareReadFailure,
            DaqError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for DAQ operations
pub type DaqResult<T> = Result<T, DaqError>;

/// Descriptive message for an error kind, in a fixed-length NUL-padded buffer
///
/// Mirrors the C ABI error-message lookup: the message is truncated to
/// `ERR_MSG_LEN - 1` bytes and the remainder of the buffer is zero-filled.
pub fn error_message(kind: ErrorKind) -> [u8; ERR_MSG_LEN] {
    let text = match kind {
        ErrorKind::NotConnected => "Device not connected or connection lost",
        ErrorKind::AlreadyActive => "A background scan operation is already in progress",
        ErrorKind::BadArgument => "Invalid argument",
        ErrorKind::ConfigNotSupported => "Configuration not supported",
        ErrorKind::Overrun => "FIFO overrun, data was not transferred from the device fast enough",
        ErrorKind::Underrun => "FIFO underrun, data was not transferred to the device fast enough",
        ErrorKind::TimedOut => "Operation timed out",
        ErrorKind::NoFirmware => "Device firmware not loaded",
        ErrorKind::FirmwareFileNotFound => "Firmware file not found",
        ErrorKind::FirmwareReadFailure => "Unable to read firmware file",
        ErrorKind::Internal => "Internal error",
    };

    let mut buf = [0u8; ERR_MSG_LEN];
    let bytes = text.as_bytes();
    let len = bytes.len().min(ERR_MSG_LEN - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

impl From<std::io::Error> for DaqError {
    fn from(err: std::io::Error) -> Self {
        DaqError::Internal(err.to_string())
    }
}
