//! RD-8 sysex envelope
//!
//! Every message starts with the same seven bytes:
//!
//! ```text
//! 00 20 32 | 30 | dev | type | id | payload...
//! manufacturer  product  device  message type/ID
//! ```
//!
//! Requests sent to the device additionally carry a magic word and the
//! firmware version right after the header. Unsolicited dumps from the device
//! and pattern/song write-backs do not.

use tracing::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::SysexError;
use crate::types::{DeviceIdentity, FirmwareVersion, SysexMessage};

/// Manufacturer ID (Behringer, three-byte form)
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x20, 0x32];

/// Product ID of the RD-8
pub const PRODUCT_ID: u8 = 0x30;

/// Length of the fixed envelope header
pub const HEADER_LEN: usize = 7;

/// Magic word that precedes the firmware version in requests
pub const REQUEST_MAGIC: [u8; 4] = [0x30, 0x00, 0x00, 0x00];

/// Highest sysex device ID (4-bit field)
pub const MAX_DEVICE_ID: u8 = 0x0F;

/// Message types and IDs
pub mod msg {
    pub const FIRMWARE: u8 = 0x06;
    pub const DATA: u8 = 0x10;

    // Firmware message IDs
    pub const REQUEST: u8 = 0x01;
    pub const REPLY: u8 = 0x02;

    // Data message IDs
    pub const STORED_PATTERN_REQUEST: u8 = 0x01;
    pub const STORED_PATTERN_RESPONSE: u8 = 0x02;
    pub const STORED_SONG_REQUEST: u8 = 0x03;
    pub const STORED_SONG_RESPONSE: u8 = 0x04;
    pub const LIVE_PATTERN_REQUEST: u8 = 0x05;
    pub const LIVE_PATTERN_RESPONSE: u8 = 0x06;
    pub const LIVE_SONG_REQUEST: u8 = 0x07;
    pub const LIVE_SONG_RESPONSE: u8 = 0x08;
    pub const GLOBAL_SETTINGS_REQUEST: u8 = 0x09;
    pub const GLOBAL_SETTINGS_RESPONSE: u8 = 0x0A;

    /// Get human-readable name for a message type/ID pair
    pub fn name(message_type: u8, message_id: u8) -> &'static str {
        match (message_type, message_id) {
            (FIRMWARE, REQUEST) => "FIRMWARE_REQUEST",
            (FIRMWARE, REPLY) => "FIRMWARE_REPLY",
            (DATA, STORED_PATTERN_REQUEST) => "STORED_PATTERN_REQUEST",
            (DATA, STORED_PATTERN_RESPONSE) => "STORED_PATTERN_RESPONSE",
            (DATA, STORED_SONG_REQUEST) => "STORED_SONG_REQUEST",
            (DATA, STORED_SONG_RESPONSE) => "STORED_SONG_RESPONSE",
            (DATA, LIVE_PATTERN_REQUEST) => "LIVE_PATTERN_REQUEST",
            (DATA, LIVE_PATTERN_RESPONSE) => "LIVE_PATTERN_RESPONSE",
            (DATA, LIVE_SONG_REQUEST) => "LIVE_SONG_REQUEST",
            (DATA, LIVE_SONG_RESPONSE) => "LIVE_SONG_RESPONSE",
            (DATA, GLOBAL_SETTINGS_REQUEST) => "GLOBAL_SETTINGS_REQUEST",
            (DATA, GLOBAL_SETTINGS_RESPONSE) => "GLOBAL_SETTINGS_RESPONSE",
            _ => "UNKNOWN",
        }
    }
}

/// Message type/ID pair read from bytes 5 and 6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub message_type: u8,
    pub message_id: u8,
}

impl MessageId {
    /// Returned by [`classify`] for anything that is not an RD-8 message
    pub const NOT_OURS: Self = Self::new(0xFF, 0xFF);

    pub const fn new(message_type: u8, message_id: u8) -> Self {
        Self {
            message_type,
            message_id,
        }
    }

    pub fn is_ours(&self) -> bool {
        *self != Self::NOT_OURS
    }

    pub fn name(&self) -> &'static str {
        if self.is_ours() {
            msg::name(self.message_type, self.message_id)
        } else {
            "NOT_OURS"
        }
    }
}

/// Magic + firmware version block appended to request headers
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RequestHeader {
    magic: [u8; 4],
    version: [u8; 3],
}

impl RequestHeader {
    pub fn new(version: FirmwareVersion) -> Self {
        Self {
            magic: REQUEST_MAGIC,
            version: version.to_bytes(),
        }
    }
}

/// Firmware (identity) reply layout, 14 bytes
///
/// Bytes 7-10 are reserved according to the manual.
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FirmwareReply {
    manufacturer: [u8; 3],
    product: u8,
    device_id: u8,
    message_type: u8,
    message_id: u8,
    _reserved: [u8; 4],
    major: u8,
    minor: u8,
    patch: u8,
}

impl FirmwareReply {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(
            self.device_id,
            FirmwareVersion::new(self.major, self.minor, self.patch),
        )
    }
}

/// True if the message carries the RD-8 manufacturer/product prefix.
///
/// The device ID byte is deliberately not compared; replies may come from
/// any address.
pub fn is_own_sysex(data: &[u8]) -> bool {
    data.len() > 3 && data[..3] == MANUFACTURER_ID && data[3] == PRODUCT_ID
}

/// Build a plain message: header followed by `payload`
pub fn frame(device_id: u8, message_type: u8, message_id: u8, payload: &[u8]) -> SysexMessage {
    let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
    data.extend_from_slice(&MANUFACTURER_ID);
    data.extend_from_slice(&[PRODUCT_ID, device_id, message_type, message_id]);
    data.extend_from_slice(payload);
    SysexMessage::new(data)
}

/// Build a request: header, magic word and firmware version
pub fn request_frame(identity: &DeviceIdentity, message_type: u8, message_id: u8) -> SysexMessage {
    frame(
        identity.device_id,
        message_type,
        message_id,
        RequestHeader::new(identity.version).as_bytes(),
    )
}

/// Identity request for a candidate device address
///
/// This is the only request that can be built before the firmware version is
/// known, so it carries no magic/version block.
pub fn identity_request(device_id: u8) -> SysexMessage {
    frame(device_id, msg::FIRMWARE, msg::REQUEST, &[])
}

/// Read the type/ID pair of an RD-8 message.
///
/// Returns [`MessageId::NOT_OURS`] if the prefix does not match or the
/// message is too short to hold the pair.
pub fn classify(data: &[u8]) -> MessageId {
    if is_own_sysex(data) && data.len() >= HEADER_LEN {
        MessageId::new(data[5], data[6])
    } else {
        MessageId::NOT_OURS
    }
}

/// Extract the device identity from a firmware reply
pub fn parse_firmware_reply(data: &[u8]) -> Result<DeviceIdentity, SysexError> {
    let id = classify(data);
    if id != MessageId::new(msg::FIRMWARE, msg::REPLY) {
        return Err(SysexError::NotOurs);
    }
    let (reply, _) = FirmwareReply::ref_from_prefix(data)
        .map_err(|_| SysexError::FirmwareReplyTooShort(data.len()))?;
    let identity = reply.identity();
    debug!(
        "Firmware reply from device {} (v{})",
        identity.device_id, identity.version
    );
    Ok(identity)
}
