//! Driver configuration
//!
//! Stored as TOML in `<config_dir>/rd8/rd8.toml`. Every field has a default,
//! so a missing file or a partial one is fine.

use std::path::{Path, PathBuf};

use rd8_device::SessionConfig;
use rd8_sysex::framing::MAX_DEVICE_ID;
use rd8_sysex::{DeviceIdentity, FirmwareVersion};
use serde::{Deserialize, Serialize};

/// Device to address when building requests offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDefaults {
    /// Sysex device ID (0-15)
    pub device_id: u8,
    /// Firmware version echoed in requests, "major.minor.patch"
    pub firmware: String,
}

impl Default for DeviceDefaults {
    fn default() -> Self {
        Self {
            device_id: 0,
            firmware: "1.0.0".to_string(),
        }
    }
}

/// Top-level config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub session: SessionConfig,
    pub device: DeviceDefaults,
}

impl DriverConfig {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rd8")
            .join("rd8.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DriverConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Identity from the `[device]` table, with optional overrides
    pub fn identity(
        &self,
        device_id: Option<u8>,
        firmware: Option<FirmwareVersion>,
    ) -> anyhow::Result<DeviceIdentity> {
        let device_id = device_id.unwrap_or(self.device.device_id);
        anyhow::ensure!(
            device_id <= MAX_DEVICE_ID,
            "device ID {} out of range 0-{}",
            device_id,
            MAX_DEVICE_ID
        );
        let version = match firmware {
            Some(version) => version,
            None => self.device.firmware.parse()?,
        };
        Ok(DeviceIdentity::new(device_id, version))
    }
}
