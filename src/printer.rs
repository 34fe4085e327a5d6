//! Human-readable and JSON rendering of captured messages

use std::fmt::Write as _;

use rd8_sysex::{
    classify, DataFile, DataKind, PatternData, SettingValue, StepData, SysexMessage, SETTINGS,
};
use serde::Serialize;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Space-separated uppercase hex of the full wire message
pub fn hex(message: &SysexMessage) -> String {
    message
        .to_wire()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decoded content of one data dump
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DumpDetail {
    Pattern { pattern: Box<PatternData> },
    UnsupportedPattern { error: String },
    Song { song_no: Option<u8>, bytes: usize },
    Settings { settings: Vec<SettingValue> },
}

/// One message of a capture, classified and, if possible, decoded
#[derive(Debug, Clone, Serialize)]
pub struct MessageReport {
    pub index: usize,
    pub length: usize,
    pub message: &'static str,
    pub kind: Option<DataKind>,
    pub name: Option<String>,
    pub detail: Option<DumpDetail>,
    /// Why a recognised dump could not be decoded
    pub error: Option<String>,
}

/// Classify every message and decode the data dumps.
///
/// With `only` set, dumps of other kinds are listed but not decoded.
pub fn report(messages: &[SysexMessage], only: Option<DataKind>) -> Vec<MessageReport> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let id = classify(message.data());
            let kind = DataKind::from_message_id(id);
            let mut entry = MessageReport {
                index,
                length: message.len(),
                message: id.name(),
                kind,
                name: None,
                detail: None,
                error: None,
            };
            let Some(kind) = kind.filter(|k| only.map_or(true, |o| o == *k)) else {
                return entry;
            };
            match DataFile::from_message(kind, message) {
                Ok(file) => {
                    entry.name = Some(file.name());
                    entry.detail = Some(detail(&file));
                }
                Err(e) => entry.error = Some(e.to_string()),
            }
            entry
        })
        .collect()
}

fn detail(file: &DataFile) -> DumpDetail {
    match file {
        DataFile::StoredPattern(_) | DataFile::LivePattern(_) => match file.pattern() {
            Some(Ok(pattern)) => DumpDetail::Pattern {
                pattern: Box::new(pattern),
            },
            Some(Err(e)) => DumpDetail::UnsupportedPattern {
                error: e.to_string(),
            },
            None => DumpDetail::UnsupportedPattern {
                error: "not a pattern".to_string(),
            },
        },
        DataFile::StoredSong(song) => DumpDetail::Song {
            song_no: Some(song.song_no),
            bytes: song.blob().len(),
        },
        DataFile::LiveSong(song) => DumpDetail::Song {
            song_no: None,
            bytes: song.blob().len(),
        },
        DataFile::GlobalSettings(settings) => DumpDetail::Settings {
            settings: settings.values(),
        },
    }
}

/// Render reports in the requested format
pub fn render(reports: &[MessageReport], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for entry in reports {
                render_entry(&mut out, entry)?;
            }
            Ok(out)
        }
    }
}

fn render_entry(out: &mut String, entry: &MessageReport) -> std::fmt::Result {
    write!(out, "#{:<3} {:>5} bytes  {}", entry.index, entry.length, entry.message)?;
    if let Some(name) = &entry.name {
        write!(out, "  \"{}\"", name)?;
    }
    writeln!(out)?;
    if let Some(error) = &entry.error {
        writeln!(out, "     error: {}", error)?;
    }
    match &entry.detail {
        Some(DumpDetail::Pattern { pattern }) => render_pattern(out, pattern)?,
        Some(DumpDetail::UnsupportedPattern { error }) => writeln!(out, "     {}", error)?,
        Some(DumpDetail::Song { bytes, .. }) => {
            writeln!(out, "     {} bytes of song data (format unknown)", bytes)?
        }
        Some(DumpDetail::Settings { settings }) => render_settings(out, settings)?,
        None => {}
    }
    Ok(())
}

fn step_char(step: &StepData) -> char {
    match step {
        StepData { on: false, .. } => '.',
        StepData { repeat_on: true, .. } => 'r',
        StepData { flam: true, .. } => 'f',
        StepData {
            probability: true, ..
        } => 'p',
        _ => 'x',
    }
}

fn render_pattern(out: &mut String, pattern: &PatternData) -> std::fmt::Result {
    writeln!(
        out,
        "     tempo {}  swing {}  probability {}  flam {}  step size {}",
        pattern.tempo, pattern.swing, pattern.probability, pattern.flam_level, pattern.step_size
    )?;
    writeln!(
        out,
        "     filter {:?} {}  automation {}  polymeter {}  auto advance {}",
        pattern.filter_mode,
        on_off(pattern.filter_on),
        on_off(pattern.filter_automation_on),
        on_off(pattern.polymeter_on),
        on_off(pattern.auto_advance_on)
    )?;
    for (name, track) in pattern.track_names().iter().zip(&pattern.tracks) {
        let steps: String = track.iter().map(step_char).collect();
        writeln!(out, "     {:<18} {}", name, steps)?;
    }
    Ok(())
}

fn render_settings(out: &mut String, settings: &[SettingValue]) -> std::fmt::Result {
    for value in settings {
        let shown = match (value.value, value.label()) {
            (Some(raw), Some(label)) => format!("{} ({})", label, raw),
            (Some(raw), None) => raw.to_string(),
            (None, _) => "-".to_string(),
        };
        writeln!(
            out,
            "     {:<16} {:<30} {}",
            value.setting.group, value.setting.name, shown
        )?;
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Registry listing for `rd8 settings`
pub fn render_registry(format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(SETTINGS)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for setting in SETTINGS {
                writeln!(
                    out,
                    "{:>3}  {:<30} {:<16} {}",
                    setting.offset,
                    setting.name,
                    setting.group,
                    setting.kind.describe()
                )?;
            }
            Ok(out)
        }
    }
}
