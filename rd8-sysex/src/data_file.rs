//! The five RD-8 data dump kinds
//!
//! All dumps share the `DATA` message type and are told apart by message ID.
//! Byte layout after the 7-byte envelope:
//!
//! ```text
//! kind            7..14      14     15     payload from
//! stored pattern  preamble   song   pat    16 (escaped)
//! live pattern    preamble                 14 (escaped)
//! stored song     preamble   song          15 (opaque)
//! live song       preamble                 14 (opaque)
//! settings        preamble                 14 (escaped)
//! ```
//!
//! The preamble is kept as received so that pattern and song dumps can be sent
//! back unchanged. Settings are written back with a fresh request header.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{escape, unescape};
use crate::error::{PatternError, SysexError};
use crate::framing::{classify, frame, msg, request_frame, MessageId, HEADER_LEN};
use crate::pattern::PatternData;
use crate::settings::GlobalSettings;
use crate::types::{DeviceIdentity, SysexMessage};
use crate::{PATTERNS_PER_SONG, SONG_COUNT};

/// Bytes between the envelope and the first per-kind field
const PREAMBLE_LEN: usize = 7;

/// Offset of the first per-kind field
const BODY_OFFSET: usize = HEADER_LEN + PREAMBLE_LEN;

/// Which dump a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    StoredPattern,
    LivePattern,
    StoredSong,
    LiveSong,
    GlobalSettings,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::StoredPattern,
        DataKind::LivePattern,
        DataKind::StoredSong,
        DataKind::LiveSong,
        DataKind::GlobalSettings,
    ];

    pub fn request_id(self) -> u8 {
        match self {
            DataKind::StoredPattern => msg::STORED_PATTERN_REQUEST,
            DataKind::LivePattern => msg::LIVE_PATTERN_REQUEST,
            DataKind::StoredSong => msg::STORED_SONG_REQUEST,
            DataKind::LiveSong => msg::LIVE_SONG_REQUEST,
            DataKind::GlobalSettings => msg::GLOBAL_SETTINGS_REQUEST,
        }
    }

    pub fn response_id(self) -> u8 {
        match self {
            DataKind::StoredPattern => msg::STORED_PATTERN_RESPONSE,
            DataKind::LivePattern => msg::LIVE_PATTERN_RESPONSE,
            DataKind::StoredSong => msg::STORED_SONG_RESPONSE,
            DataKind::LiveSong => msg::LIVE_SONG_RESPONSE,
            DataKind::GlobalSettings => msg::GLOBAL_SETTINGS_RESPONSE,
        }
    }

    /// Kind of a classified message, if it is a data dump
    pub fn from_message_id(id: MessageId) -> Option<Self> {
        if id.message_type != msg::DATA {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.response_id() == id.message_id)
    }

    /// Offset of the payload within the message
    pub fn payload_offset(self) -> usize {
        match self {
            DataKind::StoredPattern => BODY_OFFSET + 2,
            DataKind::StoredSong => BODY_OFFSET + 1,
            DataKind::LivePattern | DataKind::LiveSong | DataKind::GlobalSettings => BODY_OFFSET,
        }
    }

    /// Whether the payload is 7-bit packed (songs are kept opaque)
    pub fn is_escaped(self) -> bool {
        !matches!(self, DataKind::StoredSong | DataKind::LiveSong)
    }

    /// Number of addressable items of this kind
    pub fn item_count(self) -> usize {
        match self {
            DataKind::StoredPattern => SONG_COUNT * PATTERNS_PER_SONG,
            DataKind::LivePattern | DataKind::StoredSong => SONG_COUNT,
            DataKind::LiveSong | DataKind::GlobalSettings => 1,
        }
    }

    /// Short name as used on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::StoredPattern => "stored-pattern",
            DataKind::LivePattern => "live-pattern",
            DataKind::StoredSong => "stored-song",
            DataKind::LiveSong => "live-song",
            DataKind::GlobalSettings => "settings",
        }
    }

    /// Build the request for one item
    pub fn request(
        self,
        identity: &DeviceIdentity,
        item: usize,
    ) -> Result<SysexMessage, SysexError> {
        let count = self.item_count();
        if item >= count {
            return Err(SysexError::ItemOutOfRange {
                kind: self,
                item,
                count,
            });
        }
        let mut data = request_frame(identity, msg::DATA, self.request_id()).into_data();
        // item < 256, so both parts fit in a data byte
        match self {
            DataKind::StoredPattern => {
                data.push((item / PATTERNS_PER_SONG) as u8);
                data.push((item % PATTERNS_PER_SONG) as u8);
            }
            DataKind::LivePattern => data.push((item / PATTERNS_PER_SONG) as u8),
            DataKind::StoredSong => data.push(item as u8),
            DataKind::LiveSong | DataKind::GlobalSettings => {}
        }
        Ok(SysexMessage::new(data))
    }

    /// True if `data` is an RD-8 dump of this kind
    pub fn is_data_dump(self, data: &[u8]) -> bool {
        classify(data) == MessageId::new(msg::DATA, self.response_id())
    }

    /// Decode the first dump of this kind found in `messages`
    pub fn decode(self, messages: &[SysexMessage]) -> Result<DataFile, SysexError> {
        let message = messages
            .iter()
            .find(|m| self.is_data_dump(m.data()))
            .ok_or(SysexError::NoDataDump {
                kind: self,
                count: messages.len(),
            })?;
        DataFile::from_message(self, message)
    }

    /// Decode every dump of this kind in `messages`, skipping broken ones
    pub fn load(self, messages: &[SysexMessage]) -> Vec<DataFile> {
        messages
            .iter()
            .filter(|m| self.is_data_dump(m.data()))
            .filter_map(|m| match DataFile::from_message(self, m) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Skipping {} dump: {}", self, e);
                    None
                }
            })
            .collect()
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = SysexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SysexError::UnknownKind(s.to_string()))
    }
}

/// A stored pattern: song/pattern slot plus escaped pattern payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPattern {
    preamble: [u8; PREAMBLE_LEN],
    pub song_no: u8,
    pub pattern_no: u8,
    payload: Vec<u8>,
}

impl StoredPattern {
    /// Unescaped pattern payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn pattern(&self) -> Result<PatternData, PatternError> {
        PatternData::decode(&self.payload)
    }
}

/// The pattern currently loaded on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePattern {
    preamble: [u8; PREAMBLE_LEN],
    payload: Vec<u8>,
}

impl LivePattern {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn pattern(&self) -> Result<PatternData, PatternError> {
        PatternData::decode(&self.payload)
    }
}

/// A stored song; the song body layout is unknown and kept as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSong {
    preamble: [u8; PREAMBLE_LEN],
    pub song_no: u8,
    blob: Vec<u8>,
}

impl StoredSong {
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }
}

/// The song currently loaded on the device, kept as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSong {
    preamble: [u8; PREAMBLE_LEN],
    blob: Vec<u8>,
}

impl LiveSong {
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }
}

/// One decoded dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFile {
    StoredPattern(StoredPattern),
    LivePattern(LivePattern),
    StoredSong(StoredSong),
    LiveSong(LiveSong),
    GlobalSettings(GlobalSettings),
}

impl DataFile {
    /// Decode a single message already known to be a `kind` dump
    pub fn from_message(kind: DataKind, message: &SysexMessage) -> Result<Self, SysexError> {
        let data = message.data();
        let body_len = kind.payload_offset();
        if data.len() < body_len {
            return Err(SysexError::TooShort {
                kind,
                expected: body_len,
                got: data.len(),
            });
        }
        let mut preamble = [0u8; PREAMBLE_LEN];
        preamble.copy_from_slice(&data[HEADER_LEN..BODY_OFFSET]);
        let body = &data[body_len..];
        let payload = if kind.is_escaped() {
            unescape(body)
        } else {
            body.to_vec()
        };
        debug!("Decoded {} dump, {} payload bytes", kind, payload.len());

        Ok(match kind {
            DataKind::StoredPattern => DataFile::StoredPattern(StoredPattern {
                preamble,
                song_no: data[BODY_OFFSET],
                pattern_no: data[BODY_OFFSET + 1],
                payload,
            }),
            DataKind::LivePattern => DataFile::LivePattern(LivePattern { preamble, payload }),
            DataKind::StoredSong => DataFile::StoredSong(StoredSong {
                preamble,
                song_no: data[BODY_OFFSET],
                blob: payload,
            }),
            DataKind::LiveSong => DataFile::LiveSong(LiveSong {
                preamble,
                blob: payload,
            }),
            DataKind::GlobalSettings => {
                DataFile::GlobalSettings(GlobalSettings::from_payload(payload))
            }
        })
    }

    pub fn kind(&self) -> DataKind {
        match self {
            DataFile::StoredPattern(_) => DataKind::StoredPattern,
            DataFile::LivePattern(_) => DataKind::LivePattern,
            DataFile::StoredSong(_) => DataKind::StoredSong,
            DataFile::LiveSong(_) => DataKind::LiveSong,
            DataFile::GlobalSettings(_) => DataKind::GlobalSettings,
        }
    }

    /// Display name, e.g. "Pattern 02/011"
    pub fn name(&self) -> String {
        match self {
            DataFile::StoredPattern(p) => format!("Pattern {:02}/{:03}", p.song_no, p.pattern_no),
            DataFile::LivePattern(_) => "Live Pattern".to_string(),
            DataFile::StoredSong(s) => format!("Stored Song {:02}", s.song_no),
            DataFile::LiveSong(_) => "Live Song".to_string(),
            DataFile::GlobalSettings(_) => "Settings".to_string(),
        }
    }

    /// Decoded pattern, for pattern dumps only
    pub fn pattern(&self) -> Option<Result<PatternData, PatternError>> {
        match self {
            DataFile::StoredPattern(p) => Some(p.pattern()),
            DataFile::LivePattern(p) => Some(p.pattern()),
            _ => None,
        }
    }

    pub fn settings(&self) -> Option<&GlobalSettings> {
        match self {
            DataFile::GlobalSettings(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_settings(self) -> Option<GlobalSettings> {
        match self {
            DataFile::GlobalSettings(s) => Some(s),
            _ => None,
        }
    }

    /// Build the message that sends this dump back to `identity`.
    ///
    /// Patterns and songs reuse their received preamble in a plain frame.
    /// Settings go out in a request frame carrying the session's version.
    pub fn encode(&self, identity: &DeviceIdentity) -> SysexMessage {
        let kind = self.kind();
        let plain = |preamble: &[u8; PREAMBLE_LEN], fields: &[u8], body: &[u8]| {
            let mut payload = Vec::with_capacity(PREAMBLE_LEN + fields.len() + body.len());
            payload.extend_from_slice(preamble);
            payload.extend_from_slice(fields);
            payload.extend_from_slice(body);
            frame(identity.device_id, msg::DATA, kind.response_id(), &payload)
        };
        match self {
            DataFile::StoredPattern(p) => {
                plain(&p.preamble, &[p.song_no, p.pattern_no], &escape(&p.payload))
            }
            DataFile::LivePattern(p) => plain(&p.preamble, &[], &escape(&p.payload)),
            DataFile::StoredSong(s) => plain(&s.preamble, &[s.song_no], &s.blob),
            DataFile::LiveSong(s) => plain(&s.preamble, &[], &s.blob),
            DataFile::GlobalSettings(s) => {
                let mut data = request_frame(identity, msg::DATA, kind.response_id()).into_data();
                data.extend(escape(s.data()));
                SysexMessage::new(data)
            }
        }
    }
}
