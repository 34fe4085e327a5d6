// CLI definitions using clap

use clap::{Parser, Subcommand};
use rd8_sysex::{DataKind, FirmwareVersion};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rd8")]
#[command(author, version, about = "Behringer RD-8 sysex toolkit")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/rd8/rd8.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify every message in a .syx capture and decode data dumps
    #[command(visible_alias = "d")]
    Decode {
        /// Capture file
        file: PathBuf,

        /// Only decode dumps of this kind (stored-pattern, live-pattern,
        /// stored-song, live-song, settings)
        #[arg(short, long)]
        kind: Option<DataKind>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the request message for one data item as hex
    #[command(visible_alias = "req")]
    Request {
        /// Data kind to request
        kind: DataKind,

        /// Item number (stored patterns: song * 16 + pattern)
        #[arg(default_value_t = 0)]
        item: usize,

        /// Sysex device ID (default from config)
        #[arg(long)]
        device_id: Option<u8>,

        /// Firmware version to echo, e.g. 1.0.5 (default from config)
        #[arg(long)]
        firmware: Option<FirmwareVersion>,
    },

    /// Change settings in a settings dump and print the write-back message
    Patch {
        /// Capture containing a settings dump
        file: PathBuf,

        /// Setting to change, e.g. --set "MIDI RX Channel=9" (repeatable).
        /// VALUE is a label as listed by `rd8 decode`, or else the raw code
        #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
        set: Vec<String>,

        /// Sysex device ID (default: the one in the dump)
        #[arg(long)]
        device_id: Option<u8>,

        /// Firmware version to echo (default from config)
        #[arg(long)]
        firmware: Option<FirmwareVersion>,
    },

    /// List all known settings with offsets and value ranges
    #[command(visible_alias = "s")]
    Settings {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}
