//! Offline tooling for the Behringer RD-8 drum machine
//!
//! Splits `.syx` captures into messages, renders decoded dumps and loads the
//! driver configuration. The protocol lives in `rd8-sysex`, the stateful
//! device session in `rd8-device`.

pub mod config;
pub mod dump;
pub mod printer;

pub use config::{DeviceDefaults, DriverConfig};
pub use dump::{read_file, split_messages, DumpError};
pub use printer::{hex, render, render_registry, report, MessageReport, OutputFormat};
