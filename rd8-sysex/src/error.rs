//! Protocol error types

use thiserror::Error;

use crate::data_file::DataKind;

/// Errors raised while framing, classifying or decoding sysex messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SysexError {
    #[error("Not a sysex message: {0}")]
    NotSysex(&'static str),

    #[error("Not an RD-8 sysex message")]
    NotOurs,

    #[error("No {kind} dump among {count} message(s)")]
    NoDataDump { kind: DataKind, count: usize },

    #[error("{kind} dump too short: need at least {expected} bytes, got {got}")]
    TooShort {
        kind: DataKind,
        expected: usize,
        got: usize,
    },

    #[error("Item {item} out of range for {kind} (count {count})")]
    ItemOutOfRange {
        kind: DataKind,
        item: usize,
        count: usize,
    },

    #[error("Firmware reply too short: {0} bytes")]
    FirmwareReplyTooShort(usize),

    #[error("Invalid firmware version: {0}")]
    InvalidVersion(String),

    #[error("Unknown data kind: {0}")]
    UnknownKind(String),
}

/// Errors raised by the pattern decoder
///
/// The decoder is fail-closed: any of these means nothing was decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern payload has {got} bytes, expected {expected}")]
    Length { expected: usize, got: usize },

    #[error("Unsupported pattern data version {version} / product variant 0x{variant:02X}")]
    Guard { version: u8, variant: u8 },
}

/// Errors raised by settings peek/poke
///
/// All of them leave the backing settings block untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Invalid value {value} for setting \"{name}\"")]
    InvalidValue { name: &'static str, value: u8 },

    #[error("Setting \"{name}\" at offset {offset} is beyond the {len}-byte settings block")]
    OffsetOutOfRange {
        name: &'static str,
        offset: usize,
        len: usize,
    },
}
