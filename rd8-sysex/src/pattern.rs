//! Pattern payload decoder
//!
//! A decoded pattern payload is exactly 889 bytes:
//!
//! ```text
//! 0        data version (0)
//! 1        product variant (0x08)
//! 2..770   12 tracks x 64 step bytes, row-major
//! 804..    pattern parameters (tempo, swing, ..., auto advance)
//! ```
//!
//! The parameter offsets were observed on a single firmware generation. The
//! version/variant guard exists so that any other layout is rejected instead
//! of being read at the wrong offsets.

use serde::Serialize;
use tracing::warn;

use crate::error::PatternError;

/// Decoded length of a pattern payload
pub const PATTERN_PAYLOAD_LEN: usize = 889;

/// Number of tracks (instruments plus accent)
pub const TRACK_COUNT: usize = 12;

/// Steps per track
pub const STEP_COUNT: usize = 64;

/// Track names in payload order
pub const TRACK_NAMES: [&str; TRACK_COUNT] = [
    "Accent",
    "Bass Drum",
    "Snare Drum",
    "Low Tom/Conga",
    "Mid Tom/Conga",
    "High Tom/Conga",
    "Rim Shot/Claves",
    "Hand Clap/Maracas",
    "Cow Bell",
    "Cymbal",
    "Open Hat",
    "Closed Hat",
];

const SUPPORTED_DATA_VERSION: u8 = 0;
const SUPPORTED_PRODUCT_VARIANT: u8 = 0x08;

/// Absolute payload offsets
mod offset {
    use super::{STEP_COUNT, TRACK_COUNT};

    pub const DATA_VERSION: usize = 0;
    pub const PRODUCT_VARIANT: usize = 1;
    pub const STEPS: usize = 2;
    pub const STEPS_END: usize = STEPS + TRACK_COUNT * STEP_COUNT;

    pub const TEMPO: usize = 804;
    pub const SWING: usize = TEMPO + 1;
    pub const PROBABILITY: usize = SWING + 1;
    pub const FLAM_LEVEL: usize = PROBABILITY + 1;
    pub const FILTER_MODE: usize = FLAM_LEVEL + 1;
    pub const FILTER_ENABLE: usize = FILTER_MODE + 1;
    pub const FILTER_AUTOMATION: usize = FILTER_ENABLE + 1;
    pub const FILTER_STEPS: usize = FILTER_AUTOMATION + 1;
    pub const POLYMETER: usize = FILTER_STEPS + STEP_COUNT;
    pub const STEP_SIZE: usize = POLYMETER + 1;
    pub const AUTO_ADVANCE: usize = STEP_SIZE + 1;
}

/// Step byte bit layout (bits 1 and 7 unused)
mod step_bits {
    pub const ON_OFF: u8 = 1 << 0;
    pub const PROBABILITY: u8 = 1 << 2;
    pub const FLAM: u8 = 1 << 3;
    pub const REPEAT_ON_OFF: u8 = 1 << 4;
    pub const REPEAT_MASK: u8 = 3 << 5;
    pub const REPEAT_SHIFT: u8 = 5;
}

/// One step of one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepData {
    pub on: bool,
    pub probability: bool,
    pub flam: bool,
    pub repeat_on: bool,
    /// Note repeat count, 0-3
    pub repeat: u8,
}

impl StepData {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            on: byte & step_bits::ON_OFF != 0,
            probability: byte & step_bits::PROBABILITY != 0,
            flam: byte & step_bits::FLAM != 0,
            repeat_on: byte & step_bits::REPEAT_ON_OFF != 0,
            repeat: (byte & step_bits::REPEAT_MASK) >> step_bits::REPEAT_SHIFT,
        }
    }
}

/// Pattern filter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterMode {
    LowPass,
    HighPass,
    Unknown(u8),
}

impl From<u8> for FilterMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::LowPass,
            1 => Self::HighPass,
            other => Self::Unknown(other),
        }
    }
}

/// A decoded pattern: step grid plus pattern parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternData {
    /// `TRACK_COUNT` tracks of `STEP_COUNT` steps, in `TRACK_NAMES` order
    pub tracks: Vec<Vec<StepData>>,
    pub tempo: u8,
    pub swing: u8,
    pub probability: u8,
    pub flam_level: u8,
    pub filter_mode: FilterMode,
    pub filter_on: bool,
    pub filter_automation_on: bool,
    pub filter_steps: Vec<u8>,
    pub polymeter_on: bool,
    pub step_size: u8,
    pub auto_advance_on: bool,
}

impl PatternData {
    /// Decode an unescaped pattern payload.
    ///
    /// Fails without a partial result if the length or the version/variant
    /// guard does not match.
    pub fn decode(payload: &[u8]) -> Result<Self, PatternError> {
        if payload.len() != PATTERN_PAYLOAD_LEN {
            return Err(PatternError::Length {
                expected: PATTERN_PAYLOAD_LEN,
                got: payload.len(),
            });
        }
        let version = payload[offset::DATA_VERSION];
        let variant = payload[offset::PRODUCT_VARIANT];
        if version != SUPPORTED_DATA_VERSION || variant != SUPPORTED_PRODUCT_VARIANT {
            return Err(PatternError::Guard { version, variant });
        }

        let tracks = payload[offset::STEPS..offset::STEPS_END]
            .chunks(STEP_COUNT)
            .map(|track| track.iter().map(|&b| StepData::from_byte(b)).collect())
            .collect();

        Ok(Self {
            tracks,
            tempo: payload[offset::TEMPO],
            swing: payload[offset::SWING],
            probability: payload[offset::PROBABILITY],
            flam_level: payload[offset::FLAM_LEVEL],
            filter_mode: FilterMode::from(payload[offset::FILTER_MODE]),
            filter_on: flag(payload, offset::FILTER_ENABLE, "filter enable"),
            filter_automation_on: flag(payload, offset::FILTER_AUTOMATION, "filter automation"),
            filter_steps: payload[offset::FILTER_STEPS..offset::FILTER_STEPS + STEP_COUNT].to_vec(),
            polymeter_on: flag(payload, offset::POLYMETER, "polymeter"),
            step_size: payload[offset::STEP_SIZE],
            auto_advance_on: flag(payload, offset::AUTO_ADVANCE, "auto advance"),
        })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_names(&self) -> &'static [&'static str] {
        &TRACK_NAMES
    }

    pub fn track(&self, track_no: usize) -> Option<&[StepData]> {
        self.tracks.get(track_no).map(Vec::as_slice)
    }
}

/// Boolean parameter byte. Anything but 0/1 is unexpected but treated as on.
fn flag(payload: &[u8], at: usize, field: &str) -> bool {
    let value = payload[at];
    if value > 1 {
        warn!("Pattern {} byte at {} is 0x{:02X}, expected 0 or 1", field, at, value);
    }
    value != 0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Valid payload with a recognisable step and parameter layout
    pub(crate) fn sample_payload() -> Vec<u8> {
        let mut p = vec![0u8; PATTERN_PAYLOAD_LEN];
        p[offset::PRODUCT_VARIANT] = SUPPORTED_PRODUCT_VARIANT;
        // Bass drum (track 1) step 0: on, repeat on, repeat 1
        p[offset::STEPS + STEP_COUNT] = 0b0011_0001;
        // Closed hat (track 11) last step: on, probability, flam, repeat 3
        p[offset::STEPS + 11 * STEP_COUNT + 63] = 0b0111_1101;
        p[offset::TEMPO] = 120;
        p[offset::SWING] = 54;
        p[offset::PROBABILITY] = 80;
        p[offset::FLAM_LEVEL] = 12;
        p[offset::FILTER_MODE] = 1;
        p[offset::FILTER_ENABLE] = 1;
        p[offset::FILTER_STEPS + 5] = 99;
        p[offset::POLYMETER] = 1;
        p[offset::STEP_SIZE] = 3;
        p[offset::AUTO_ADVANCE] = 0;
        p
    }

    #[test]
    fn test_offsets() {
        assert_eq!(offset::STEPS_END, 770);
        assert_eq!(offset::FILTER_STEPS, 811);
        assert_eq!(offset::POLYMETER, 875);
        assert_eq!(offset::AUTO_ADVANCE, 877);
    }

    #[test]
    fn test_step_byte_decoding() {
        assert_eq!(
            StepData::from_byte(0b0011_0001),
            StepData {
                on: true,
                probability: false,
                flam: false,
                repeat_on: true,
                repeat: 1,
            }
        );
        assert_eq!(StepData::from_byte(0), StepData::default());
    }

    #[test]
    fn test_unused_bits_ignored() {
        assert_eq!(StepData::from_byte(0b1000_0010), StepData::default());
    }

    #[test]
    fn test_decode_grid_and_parameters() {
        let pattern = PatternData::decode(&sample_payload()).unwrap();
        assert_eq!(pattern.track_count(), TRACK_COUNT);
        assert!(pattern.tracks.iter().all(|t| t.len() == STEP_COUNT));

        let bass = pattern.track(1).unwrap();
        assert!(bass[0].on && bass[0].repeat_on);
        assert_eq!(bass[0].repeat, 1);
        assert!(!bass[1].on);

        let hat = pattern.track(11).unwrap()[63];
        assert!(hat.on && hat.probability && hat.flam && hat.repeat_on);
        assert_eq!(hat.repeat, 3);

        assert_eq!(pattern.tempo, 120);
        assert_eq!(pattern.swing, 54);
        assert_eq!(pattern.probability, 80);
        assert_eq!(pattern.flam_level, 12);
        assert_eq!(pattern.filter_mode, FilterMode::HighPass);
        assert!(pattern.filter_on);
        assert!(!pattern.filter_automation_on);
        assert_eq!(pattern.filter_steps.len(), STEP_COUNT);
        assert_eq!(pattern.filter_steps[5], 99);
        assert!(pattern.polymeter_on);
        assert_eq!(pattern.step_size, 3);
        assert!(!pattern.auto_advance_on);
        assert!(pattern.track(12).is_none());
    }

    #[test]
    fn test_guard_mismatch_rejected() {
        let mut p = sample_payload();
        p[offset::PRODUCT_VARIANT] = 0x07;
        assert_eq!(
            PatternData::decode(&p),
            Err(PatternError::Guard {
                version: 0,
                variant: 0x07
            })
        );

        let mut p = sample_payload();
        p[offset::DATA_VERSION] = 1;
        assert!(PatternData::decode(&p).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut p = sample_payload();
        p.pop();
        assert_eq!(
            PatternData::decode(&p),
            Err(PatternError::Length {
                expected: 889,
                got: 888
            })
        );
    }

    #[test]
    fn test_serializes_for_presentation() {
        let pattern = PatternData::decode(&sample_payload()).unwrap();
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["tempo"], 120);
        assert_eq!(json["filter_mode"], "HighPass");
        assert_eq!(json["tracks"][1][0]["repeat"], 1);
    }
}
