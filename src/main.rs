//! RD-8 sysex toolkit CLI
//!
//! Offline companion to the device driver: inspect captures, build requests
//! and prepare settings write-backs.

use anyhow::Result;
use clap::Parser;
use rd8_driver::DriverConfig;
use tracing::debug;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    let config = DriverConfig::load(&config_path)?;
    debug!("Config: {:?}", config);

    match cli.command {
        Commands::Decode { file, kind, json } => commands::decode(&file, kind, json),
        Commands::Request {
            kind,
            item,
            device_id,
            firmware,
        } => commands::request(&config, kind, item, device_id, firmware),
        Commands::Patch {
            file,
            set,
            device_id,
            firmware,
        } => commands::patch(&config, &file, &set, device_id, firmware),
        Commands::Settings { json } => commands::settings(json),
        Commands::Config => commands::show_config(&config, &config_path),
    }
}
