//! Session timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for a `DeviceSession`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a settings roundtrip may stay outstanding
    pub reply_timeout_ms: u64,
    /// Quiet period before a debounced settings write goes out
    pub debounce_ms: u64,
    /// Wait after broadcasting identity requests
    pub detect_sleep_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 2000,
            debounce_ms: 250,
            detect_sleep_ms: 120,
        }
    }
}

impl SessionConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn detect_sleep(&self) -> Duration {
        Duration::from_millis(self.detect_sleep_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.reply_timeout(), Duration::from_secs(2));
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.detect_sleep(), Duration::from_millis(120));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SessionConfig = toml::from_str("reply_timeout_ms = 500").unwrap();
        assert_eq!(config.reply_timeout_ms, 500);
        assert_eq!(config.debounce_ms, 250);
    }
}
