//! Common protocol types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SysexError;

/// Firmware version reported by the device in its identity reply
///
/// Outgoing requests must echo it back, so it is part of the session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version bytes in wire order
    pub fn to_bytes(self) -> [u8; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FirmwareVersion {
    type Err = SysexError;

    /// Parse "major.minor.patch", each part 0-127
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(SysexError::InvalidVersion(s.to_string()));
        }
        let mut bytes = [0u8; 3];
        for (slot, part) in bytes.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u8>()
                .ok()
                .filter(|v| *v < 0x80)
                .ok_or_else(|| SysexError::InvalidVersion(s.to_string()))?;
        }
        Ok(Self::new(bytes[0], bytes[1], bytes[2]))
    }
}

/// Who we are talking to: sysex device ID plus firmware version
///
/// The device ID is the 4-bit hardware address from the sysex header,
/// not a MIDI channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: u8,
    pub version: FirmwareVersion,
}

impl DeviceIdentity {
    pub const fn new(device_id: u8, version: FirmwareVersion) -> Self {
        Self { device_id, version }
    }
}

/// One System Exclusive message, stored without the F0/F7 delimiters
///
/// Byte offsets used throughout the crate index into this data, so offset 0
/// is the first manufacturer byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SysexMessage {
    data: Vec<u8>,
}

impl SysexMessage {
    /// Start of exclusive status byte
    pub const START: u8 = 0xF0;
    /// End of exclusive status byte
    pub const END: u8 = 0xF7;

    /// Wrap sysex data bytes (no delimiters)
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Parse a complete wire message including F0 and F7
    pub fn from_wire(bytes: &[u8]) -> Result<Self, SysexError> {
        match bytes {
            [Self::START, data @ .., Self::END] => {
                if data.iter().any(|b| b & 0x80 != 0) {
                    return Err(SysexError::NotSysex("status byte inside data"));
                }
                Ok(Self::new(data.to_vec()))
            }
            [Self::START, ..] => Err(SysexError::NotSysex("missing end of exclusive")),
            _ => Err(SysexError::NotSysex("missing start of exclusive")),
        }
    }

    /// Data bytes without delimiters
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes as sent on the wire, F0 ... F7
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.data.len() + 2);
        wire.push(Self::START);
        wire.extend_from_slice(&self.data);
        wire.push(Self::END);
        wire
    }
}

impl From<Vec<u8>> for SysexMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for SysexMessage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
