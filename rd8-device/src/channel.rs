//! MIDI channel assignment as stored in the settings block

use std::fmt;

use serde::Serialize;

use crate::error::DeviceError;

/// Settings code for "all channels"
pub const OMNI_CODE: u8 = 16;

/// A receive/transmit channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MidiChannel {
    /// Zero-based channel, 0-15
    Channel(u8),
    Omni,
}

impl MidiChannel {
    /// Channel from a zero-based number
    pub fn from_zero_based(channel: u8) -> Result<Self, DeviceError> {
        if channel < OMNI_CODE {
            Ok(Self::Channel(channel))
        } else {
            Err(DeviceError::InvalidParameter(format!(
                "MIDI channel {} out of range 0-15",
                channel
            )))
        }
    }

    /// Interpret a settings code.
    ///
    /// Code 17 shows up in the channel enums but its meaning is unknown, so it
    /// is rejected along with everything else above omni.
    pub fn from_code(code: u8) -> Result<Self, DeviceError> {
        match code {
            0..=15 => Ok(Self::Channel(code)),
            OMNI_CODE => Ok(Self::Omni),
            other => Err(DeviceError::UnsupportedChannelCode(other)),
        }
    }

    pub fn to_code(self) -> u8 {
        match self {
            Self::Channel(channel) => channel,
            Self::Omni => OMNI_CODE,
        }
    }

    /// Settings code, rejecting a hand-built `Channel` above 15
    pub fn checked_code(self) -> Result<u8, DeviceError> {
        match self {
            Self::Channel(channel) => Self::from_zero_based(channel).map(Self::to_code),
            Self::Omni => Ok(OMNI_CODE),
        }
    }

    pub fn is_omni(self) -> bool {
        self == Self::Omni
    }
}

impl fmt::Display for MidiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(channel) => write!(f, "{}", channel + 1),
            Self::Omni => f.write_str("Omni"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(MidiChannel::from_code(0), Ok(MidiChannel::Channel(0)));
        assert_eq!(MidiChannel::from_code(15), Ok(MidiChannel::Channel(15)));
        assert_eq!(MidiChannel::from_code(16), Ok(MidiChannel::Omni));
        assert_eq!(MidiChannel::Omni.to_code(), 16);
        assert_eq!(MidiChannel::Channel(9).to_code(), 9);
    }

    #[test]
    fn test_unconfirmed_code_rejected() {
        assert_eq!(
            MidiChannel::from_code(17),
            Err(DeviceError::UnsupportedChannelCode(17))
        );
        assert!(MidiChannel::from_code(0x7F).is_err());
    }

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(MidiChannel::Channel(0).to_string(), "1");
        assert_eq!(MidiChannel::Channel(15).to_string(), "16");
        assert_eq!(MidiChannel::Omni.to_string(), "Omni");
    }

    #[test]
    fn test_checked_code() {
        assert_eq!(MidiChannel::Channel(15).checked_code(), Ok(15));
        assert_eq!(MidiChannel::Omni.checked_code(), Ok(OMNI_CODE));
        assert!(matches!(
            MidiChannel::Channel(16).checked_code(),
            Err(DeviceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_from_zero_based() {
        assert_eq!(MidiChannel::from_zero_based(3), Ok(MidiChannel::Channel(3)));
        assert!(MidiChannel::from_zero_based(16).is_err());
    }
}
