//! Command handlers for the CLI application.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rd8_driver::{printer, read_file, DriverConfig, OutputFormat};
use rd8_sysex::settings::find_setting;
use rd8_sysex::{DataFile, DataKind, FirmwareVersion, GlobalSettings, SysexMessage};
use tracing::info;

fn format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

/// Decode a capture file
pub fn decode(file: &Path, kind: Option<DataKind>, json: bool) -> Result<()> {
    let messages = read_file(file).with_context(|| format!("reading {}", file.display()))?;
    let reports = printer::report(&messages, kind);
    print!("{}", printer::render(&reports, format(json))?);
    Ok(())
}

/// Print a request frame
pub fn request(
    config: &DriverConfig,
    kind: DataKind,
    item: usize,
    device_id: Option<u8>,
    firmware: Option<FirmwareVersion>,
) -> Result<()> {
    let identity = config.identity(device_id, firmware)?;
    let message = kind.request(&identity, item)?;
    println!("{}", printer::hex(&message));
    Ok(())
}

/// Parse `NAME=VALUE`.
///
/// VALUE is matched against the setting's labels first, so channel "9" is
/// channel 9 (code 8). Anything else is taken as the raw code.
fn parse_assignment(assignment: &str) -> Result<(&str, u8)> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got \"{}\"", assignment))?;
    let (name, value) = (name.trim(), value.trim());
    let setting = find_setting(name).ok_or_else(|| anyhow!("unknown setting \"{}\"", name))?;
    let labelled = (0..=u8::MAX).find(|&raw| {
        setting.kind.accepts(raw)
            && setting
                .kind
                .label(raw)
                .is_some_and(|label| label.eq_ignore_ascii_case(value))
    });
    labelled
        .or_else(|| value.parse::<u8>().ok())
        .map(|raw| (name, raw))
        .ok_or_else(|| anyhow!("\"{}\" is not a valid value for \"{}\"", value, name))
}

/// Apply assignments to the settings dump in `file` and print the write-back
pub fn patch(
    config: &DriverConfig,
    file: &Path,
    assignments: &[String],
    device_id: Option<u8>,
    firmware: Option<FirmwareVersion>,
) -> Result<()> {
    let messages = read_file(file).with_context(|| format!("reading {}", file.display()))?;
    let dump: &SysexMessage = messages
        .iter()
        .find(|m| DataKind::GlobalSettings.is_data_dump(m.data()))
        .ok_or_else(|| anyhow!("no settings dump in {}", file.display()))?;
    let mut settings: GlobalSettings = DataFile::from_message(DataKind::GlobalSettings, dump)?
        .into_settings()
        .ok_or_else(|| anyhow!("not a settings dump"))?;

    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)?;
        let before = settings.peek(name)?;
        settings.poke(name, value)?;
        info!("{}: {} -> {}", name, before, value);
    }

    // Default to the address the dump came from
    let identity = config.identity(device_id.or(Some(dump.data()[4])), firmware)?;
    let message = DataFile::GlobalSettings(settings).encode(&identity);
    println!("{}", printer::hex(&message));
    Ok(())
}

/// List the settings registry
pub fn settings(json: bool) -> Result<()> {
    print!("{}", printer::render_registry(format(json))?);
    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &DriverConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
