//! 7-bit packing used by RD-8 dump payloads
//!
//! Sysex data bytes must keep bit 7 clear, so the device ships its 8-bit
//! payloads in groups: one mask byte carrying the high bits of up to seven
//! following bytes (bit `i` belongs to the `i`-th byte), then those bytes
//! with bit 7 cleared.
//!
//! ```text
//! decoded:  b0 b1 b2 b3 b4 b5 b6 | b7 b8
//! escaped:  M0 b0' .. b6'        | M1 b7' b8'
//! ```

/// Payload bytes covered by one mask byte
const GROUP_SIZE: usize = 7;

/// Unpack escaped bytes back into full 8-bit data.
///
/// A short final chunk yields only the bytes actually present.
pub fn unescape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() - input.len().div_ceil(GROUP_SIZE + 1));
    for chunk in input.chunks(GROUP_SIZE + 1) {
        if let Some((&mask, payload)) = chunk.split_first() {
            for (i, &byte) in payload.iter().enumerate() {
                out.push(byte | (((mask >> i) & 1) << 7));
            }
        }
    }
    out
}

/// Pack 8-bit data into mask-led groups of seven.
///
/// A short final group still gets its own mask byte.
pub fn escape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len().div_ceil(GROUP_SIZE));
    for group in input.chunks(GROUP_SIZE) {
        let mask = group
            .iter()
            .enumerate()
            .fold(0u8, |mask, (i, &byte)| mask | ((byte & 0x80) >> (7 - i)));
        out.push(mask);
        out.extend(group.iter().map(|&byte| byte & 0x7F));
    }
    out
}
