//! Device session for the Behringer RD-8
//!
//! Builds on `rd8-sysex` and adds the stateful part of the protocol: finding
//! the device, reading and writing the global settings block, and tracking
//! the MIDI channels and the active pattern. MIDI ports are not opened here;
//! the host injects a [`MidiIo`] and forwards inbound sysex to
//! [`DeviceSession::handle_message`].

pub mod channel;
pub mod config;
pub mod error;
pub mod io;
pub mod session;

pub use channel::MidiChannel;
pub use config::SessionConfig;
pub use error::DeviceError;
pub use io::{DebouncedSender, IoError, MidiIo};
pub use session::{DeviceSession, MessageOutcome, PendingSettings, SessionState};
