//! Device session error types

use rd8_sysex::{PatternError, SettingsError, SysexError};
use thiserror::Error;

use crate::io::IoError;

/// Errors from device session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Malformed or unexpected sysex
    #[error("Sysex error: {0}")]
    Sysex(#[from] SysexError),

    /// Settings lookup or validation failed
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// MIDI I/O layer error
    #[error("MIDI I/O error: {0}")]
    Io(#[from] IoError),

    /// Another settings roundtrip is still outstanding
    #[error("Another settings operation is still pending")]
    Busy,

    /// No firmware reply received yet
    #[error("Device not identified")]
    NotIdentified,

    /// No settings dump has been read from the device yet
    #[error("No settings read from device yet")]
    NoSettings,

    #[error("Operation timed out")]
    Timeout,

    /// The pending roundtrip was cancelled or the session reset
    #[error("Operation cancelled")]
    Cancelled,

    /// Feature not supported by this device
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Channel code the driver cannot interpret
    #[error("Unsupported MIDI channel code {0}")]
    UnsupportedChannelCode(u8),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
