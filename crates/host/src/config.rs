//! Host tool configuration management

use anyhow::{Context, Result, anyhow};
use common::parse_hex_id;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    /// Default target device
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Default device selection
///
/// IDs are hex strings such as `"0x0957"`. When `interface` is unset the
/// first USBTMC interface of the active configuration is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub interface: Option<u8>,
}

impl DeviceSettings {
    /// Configured `(vendor_id, product_id)`, if both are set
    pub fn target(&self) -> Result<Option<(u16, u16)>> {
        match (&self.vendor_id, &self.product_id) {
            (Some(vid), Some(pid)) => Ok(Some((parse_hex_id(vid)?, parse_hex_id(pid)?))),
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "Both vendor_id and product_id must be set to select a device"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Bulk transfer timeout in milliseconds
    #[serde(default = "TransferSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest command payload sent in one transfer, in bytes
    #[serde(default = "TransferSettings::default_max_transfer_size")]
    pub max_transfer_size: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            max_transfer_size: Self::default_max_transfer_size(),
        }
    }
}

impl TransferSettings {
    fn default_timeout_ms() -> u64 {
        5000
    }

    fn default_max_transfer_size() -> usize {
        4096
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the standard locations are tried in order.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/usbtmc/host.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbtmc").join("host.toml")
        } else {
            PathBuf::from(".config/usbtmc/host.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        self.device
            .target()
            .context("Invalid [device] section")?;

        if self.transfer.timeout_ms == 0 {
            return Err(anyhow!("transfer.timeout_ms must be greater than zero"));
        }
        if self.transfer.max_transfer_size == 0 {
            return Err(anyhow!("transfer.max_transfer_size must be greater than zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.transfer.timeout_ms, 5000);
        assert_eq!(config.transfer.max_transfer_size, 4096);
        assert!(config.device.vendor_id.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = HostConfig::default();
        config.general.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.general.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_target() {
        let mut device = DeviceSettings {
            vendor_id: Some("0x0957".to_string()),
            product_id: Some("0407".to_string()),
            interface: None,
        };
        assert_eq!(device.target().unwrap(), Some((0x0957, 0x0407)));

        device.product_id = None;
        assert!(device.target().is_err());

        device.vendor_id = None;
        assert_eq!(device.target().unwrap(), None);
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        let mut config = HostConfig::default();
        config.device.vendor_id = Some("0xGHIJ".to_string());
        config.device.product_id = Some("0x0407".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = HostConfig::default();
        config.transfer.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: HostConfig = toml::from_str("[general]\nlog_level = \"warn\"\n").unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.transfer.timeout_ms, 5000);
        assert!(config.device.interface.is_none());
    }
}
