//! System Exclusive protocol for the Behringer RD-8 drum machine
//!
//! This crate covers everything between raw sysex bytes and typed data:
//!
//! - 7-bit packing of dump payloads (`codec`)
//! - the outer envelope and message classification (`framing`)
//! - the five dump kinds and their byte layouts (`data_file`)
//! - the step grid and pattern parameters (`pattern`)
//! - the global settings offset table (`settings`)
//!
//! Sending and receiving the bytes is left to the caller.

pub mod codec;
pub mod data_file;
pub mod error;
pub mod framing;
pub mod pattern;
pub mod settings;
pub mod types;

pub use codec::{escape, unescape};
pub use data_file::{DataFile, DataKind, LivePattern, LiveSong, StoredPattern, StoredSong};
pub use error::{PatternError, SettingsError, SysexError};
pub use framing::{classify, frame, identity_request, request_frame, MessageId};
pub use pattern::{FilterMode, PatternData, StepData, TRACK_NAMES};
pub use settings::{GlobalSettings, Setting, SettingKind, SettingValue, SETTINGS};
pub use types::{DeviceIdentity, FirmwareVersion, SysexMessage};

/// Number of songs held by the device
pub const SONG_COUNT: usize = 16;

/// Number of patterns in each song
pub const PATTERNS_PER_SONG: usize = 16;
