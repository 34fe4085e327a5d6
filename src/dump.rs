//! Splitting raw `.syx` captures into messages
//!
//! A capture is a plain concatenation of `F0 ... F7` messages as they went
//! over the wire. Real-time bytes (`F8`-`FF`) may be interleaved anywhere
//! and are dropped; stray data bytes between messages are skipped.

use std::path::Path;

use rd8_sysex::SysexMessage;
use thiserror::Error;
use tracing::debug;

/// Errors while splitting a capture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DumpError {
    #[error("Sysex message starting at byte {0} is not terminated")]
    Unterminated(usize),

    #[error("Unexpected status byte 0x{byte:02X} at {offset} inside a sysex message")]
    UnexpectedStatus { byte: u8, offset: usize },
}

const REALTIME_FIRST: u8 = 0xF8;

/// Split a byte stream into sysex messages
pub fn split_messages(bytes: &[u8]) -> Result<Vec<SysexMessage>, DumpError> {
    let mut messages = Vec::new();
    let mut current: Option<(usize, Vec<u8>)> = None;
    let mut skipped = 0usize;

    for (offset, &byte) in bytes.iter().enumerate() {
        if byte >= REALTIME_FIRST {
            continue;
        }
        if current.is_none() {
            if byte == SysexMessage::START {
                current = Some((offset, Vec::new()));
            } else {
                skipped += 1;
            }
            continue;
        }
        if byte == SysexMessage::END {
            if let Some((_, data)) = current.take() {
                messages.push(SysexMessage::new(data));
            }
            continue;
        }
        if byte & 0x80 != 0 {
            return Err(DumpError::UnexpectedStatus { byte, offset });
        }
        if let Some((_, data)) = current.as_mut() {
            data.push(byte);
        }
    }

    if let Some((start, _)) = current {
        return Err(DumpError::Unterminated(start));
    }
    if skipped > 0 {
        debug!("Skipped {} byte(s) outside sysex messages", skipped);
    }
    Ok(messages)
}

/// Read and split a capture file
pub fn read_file(path: &Path) -> anyhow::Result<Vec<SysexMessage>> {
    let bytes = std::fs::read(path)?;
    let messages = split_messages(&bytes)?;
    debug!("{}: {} message(s)", path.display(), messages.len());
    Ok(messages)
}
