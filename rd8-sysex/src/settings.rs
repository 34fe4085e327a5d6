//! Global settings registry
//!
//! The settings dump is a flat byte block; each setting lives at a fixed
//! offset. `SETTINGS` is the single source of truth for offsets, names,
//! groups and value constraints. Reads and writes go through the registry by
//! name so a value is only ever written after it passed its constraint.

use serde::Serialize;
use tracing::debug;

use crate::error::SettingsError;

/// Value constraint of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SettingKind {
    /// 0 = off, 1 = on
    Bool,
    /// Inclusive range
    Range { min: u8, max: u8 },
    /// Closed set of codes with display labels
    Enum {
        values: &'static [(u8, &'static str)],
    },
}

impl SettingKind {
    /// Check a raw value against the constraint
    pub fn accepts(&self, value: u8) -> bool {
        match self {
            SettingKind::Bool => value <= 1,
            SettingKind::Range { min, max } => (*min..=*max).contains(&value),
            SettingKind::Enum { values } => values.iter().any(|(code, _)| *code == value),
        }
    }

    /// Display label for a raw value, if the kind has labels
    pub fn label(&self, value: u8) -> Option<&'static str> {
        match self {
            SettingKind::Bool => Some(if value != 0 { "On" } else { "Off" }),
            SettingKind::Range { .. } => None,
            SettingKind::Enum { values } => values
                .iter()
                .find(|(code, _)| *code == value)
                .map(|(_, label)| *label),
        }
    }

    /// Short description for listings (e.g. "0-15", "bool", "enum(17)")
    pub fn describe(&self) -> String {
        match self {
            SettingKind::Bool => "bool".to_string(),
            SettingKind::Range { min, max } => format!("{min}-{max}"),
            SettingKind::Enum { values } => format!("enum({})", values.len()),
        }
    }
}

/// One entry of the settings table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub offset: usize,
    pub name: &'static str,
    pub group: &'static str,
    pub kind: SettingKind,
}

impl Setting {
    const fn new(
        offset: usize,
        name: &'static str,
        group: &'static str,
        kind: SettingKind,
    ) -> Self {
        Self {
            offset,
            name,
            group,
            kind,
        }
    }
}

/// Names of settings the driver itself touches
pub mod names {
    pub const DEVICE_ID: &str = "Device ID";
    pub const MIDI_RX_CHANNEL: &str = "MIDI RX Channel";
    pub const MIDI_TX_CHANNEL: &str = "MIDI TX Channel";
}

const CLOCK_SOURCE: &[(u8, &str)] = &[(0, "Internal"), (1, "MIDI"), (2, "USB"), (3, "Trigger")];

const ANALOG_CLOCK_MODE: &[(u8, &str)] = &[
    (0, "1 PPQ"),
    (1, "2 PPQ"),
    (2, "4 PPQ"),
    (3, "24 PPQ"),
    (4, "48 PPQ"),
];

/// 0-15 are channels 1-16, 16 is omni
const MIDI_CHANNEL: &[(u8, &str)] = &[
    (0, "1"),
    (1, "2"),
    (2, "3"),
    (3, "4"),
    (4, "5"),
    (5, "6"),
    (6, "7"),
    (7, "8"),
    (8, "9"),
    (9, "10"),
    (10, "11"),
    (11, "12"),
    (12, "13"),
    (13, "14"),
    (14, "15"),
    (15, "16"),
    (16, "All (omni)"),
];

const PREFERENCE: &[(u8, &str)] = &[(0, "Song"), (1, "Global"), (2, "Pattern")];
const AUTO_ADVANCE_PREFERENCE: &[(u8, &str)] = &[(0, "Song"), (1, "Global")];
const AUTO_SCROLL_PREFERENCE: &[(u8, &str)] = &[(1, "Global"), (2, "Pattern")];

const BOOL: SettingKind = SettingKind::Bool;
const NOTE: SettingKind = SettingKind::Range { min: 0, max: 128 };
const CHANNEL: SettingKind = SettingKind::Enum {
    values: MIDI_CHANNEL,
};
const PREF: SettingKind = SettingKind::Enum { values: PREFERENCE };

const GENERAL: &str = "General";
const MIDI: &str = "MIDI";
const NOTES: &str = "Note mapping";
const PREFERENCES: &str = "Preferences";
const GLOBAL: &str = "GlobalSettings";

const fn range(min: u8, max: u8) -> SettingKind {
    SettingKind::Range { min, max }
}

const fn choice(values: &'static [(u8, &'static str)]) -> SettingKind {
    SettingKind::Enum { values }
}

/// Offset of the first global filter step; 64 step bytes follow
const GLOBAL_FILTER_STEPS: usize = 47;

/// All known settings, in device order
// Offsets 2 and 3 hold the last loaded song/pattern and are not exposed.
pub const SETTINGS: &[Setting] = &[
    Setting::new(4, names::DEVICE_ID, GENERAL, range(0, 15)),
    Setting::new(5, "Clock Source", GENERAL, choice(CLOCK_SOURCE)),
    Setting::new(6, "Analog Clock Mode", GENERAL, choice(ANALOG_CLOCK_MODE)),
    Setting::new(7, names::MIDI_RX_CHANNEL, MIDI, CHANNEL),
    Setting::new(8, names::MIDI_TX_CHANNEL, MIDI, CHANNEL),
    Setting::new(9, "MIDI to USB through", MIDI, BOOL),
    Setting::new(10, "MIDI soft through", MIDI, BOOL),
    Setting::new(11, "USB RX Channel", MIDI, CHANNEL),
    Setting::new(12, "USB TX Channel", MIDI, CHANNEL),
    Setting::new(13, "USB to MIDI through", MIDI, BOOL),
    Setting::new(14, "Bass Drum MIDI Note", NOTES, NOTE),
    Setting::new(15, "Snare Drum MIDI Note", NOTES, NOTE),
    Setting::new(16, "Low Tom MIDI Note", NOTES, NOTE),
    Setting::new(17, "Mid Tom MIDI Note", NOTES, NOTE),
    Setting::new(18, "High Tom MIDI Note", NOTES, NOTE),
    Setting::new(19, "Rim Shot MIDI Note", NOTES, NOTE),
    Setting::new(20, "Hand Clap MIDI Note", NOTES, NOTE),
    Setting::new(21, "Cow Bell MIDI Note", NOTES, NOTE),
    Setting::new(22, "Cymbal MIDI Note", NOTES, NOTE),
    Setting::new(23, "Open Hat MIDI Note", NOTES, NOTE),
    Setting::new(24, "Closed Hat MIDI Note", NOTES, NOTE),
    Setting::new(25, "Song Chain Mode", "Song mode", BOOL),
    Setting::new(26, "Tempo Preference", PREFERENCES, PREF),
    Setting::new(27, "Swing Preference", PREFERENCES, PREF),
    Setting::new(28, "Probability Preference", PREFERENCES, PREF),
    Setting::new(29, "Flam Preference", PREFERENCES, PREF),
    Setting::new(30, "Filter Mode Preference", PREFERENCES, PREF),
    Setting::new(31, "Filter Enable Preference", PREFERENCES, PREF),
    Setting::new(32, "Filter Automation Preference", PREFERENCES, PREF),
    Setting::new(33, "Polymeter Preference", PREFERENCES, PREF),
    Setting::new(34, "Step Size Preference", PREFERENCES, PREF),
    Setting::new(
        35,
        "Auto Advance Preference",
        PREFERENCES,
        choice(AUTO_ADVANCE_PREFERENCE),
    ),
    Setting::new(
        36,
        "Auto Scroll Preference",
        PREFERENCES,
        choice(AUTO_SCROLL_PREFERENCE),
    ),
    Setting::new(37, "FX Bus Preference", PREFERENCES, PREF),
    Setting::new(38, "Mute Preference", PREFERENCES, PREF),
    Setting::new(39, "Solo Preference", PREFERENCES, PREF),
    Setting::new(40, "Global Tempo", GLOBAL, range(20, 240)),
    Setting::new(41, "Global Swing", GLOBAL, range(50, 75)),
    Setting::new(42, "Global Probability", GLOBAL, range(0, 100)),
    Setting::new(43, "Global Flam", GLOBAL, range(0, 24)),
    Setting::new(44, "Global Filter Mode", GLOBAL, BOOL),
    Setting::new(45, "Global Filter Enable", GLOBAL, BOOL),
    Setting::new(46, "Global Filter Automation", GLOBAL, BOOL),
    Setting::new(
        GLOBAL_FILTER_STEPS,
        "Global Filter Steps",
        GLOBAL,
        range(0, 255),
    ),
    Setting::new(GLOBAL_FILTER_STEPS + 64, "Global Polymeter", GLOBAL, BOOL),
    Setting::new(GLOBAL_FILTER_STEPS + 65, "Global Step Size", GLOBAL, BOOL),
    Setting::new(
        GLOBAL_FILTER_STEPS + 66,
        "Global Auto-Advance",
        GLOBAL,
        BOOL,
    ),
    Setting::new(GLOBAL_FILTER_STEPS + 67, "Global Auto-Scroll", GLOBAL, BOOL),
];

/// Look up a setting by name
pub fn find_setting(name: &str) -> Option<&'static Setting> {
    SETTINGS.iter().find(|s| s.name == name)
}

/// A named setting with its current value, for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingValue {
    pub setting: &'static Setting,
    /// `None` if the settings block is too short to hold this offset
    pub value: Option<u8>,
}

impl SettingValue {
    pub fn label(&self) -> Option<&'static str> {
        self.value.and_then(|v| self.setting.kind.label(v))
    }
}

/// Unescaped global settings block as read from the device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalSettings {
    data: Vec<u8>,
}

impl GlobalSettings {
    pub fn from_payload(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Raw unescaped block
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read a setting's raw byte
    pub fn peek(&self, name: &str) -> Result<u8, SettingsError> {
        let setting =
            find_setting(name).ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))?;
        self.data
            .get(setting.offset)
            .copied()
            .ok_or(SettingsError::OffsetOutOfRange {
                name: setting.name,
                offset: setting.offset,
                len: self.data.len(),
            })
    }

    /// Validate and write a setting's raw byte.
    ///
    /// On any error the block is left unchanged.
    pub fn poke(&mut self, name: &str, value: u8) -> Result<(), SettingsError> {
        let setting =
            find_setting(name).ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))?;
        if !setting.kind.accepts(value) {
            return Err(SettingsError::InvalidValue {
                name: setting.name,
                value,
            });
        }
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(setting.offset)
            .ok_or(SettingsError::OffsetOutOfRange {
                name: setting.name,
                offset: setting.offset,
                len,
            })?;
        debug!("Setting \"{}\": {} -> {}", setting.name, *slot, value);
        *slot = value;
        Ok(())
    }

    /// Every registered setting with its current value, in table order
    pub fn values(&self) -> Vec<SettingValue> {
        SETTINGS
            .iter()
            .map(|setting| SettingValue {
                setting,
                value: self.data.get(setting.offset).copied(),
            })
            .collect()
    }
}
