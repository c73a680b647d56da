//! Configuration for the Eastron bridge.

use meterlink_common::{Format, KEY_PREFIX, LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EastronBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Meter settings
    pub eastron: MeterConfig,

    /// Payload encoding for published states
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the polled meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Key expression prefix (default: "meterlink/eastron")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Device name, the namespace of all states of this meter
    #[serde(default = "default_device")]
    pub device: String,

    /// Name of the device model in the catalog (e.g. "SDM120")
    #[serde(default)]
    pub model: Option<String>,

    /// Serial line settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Publish the absolute value of every reading
    #[serde(default)]
    pub absolute_value: bool,

    /// Time between the starts of two poll cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout of a single register read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Consecutive failed reads tolerated before the link is reported down
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Skip the remaining registers of a cycle after the first failed read
    #[serde(default = "default_abort_cycle_on_failure")]
    pub abort_cycle_on_failure: bool,

    /// Additional JSON5 model catalog, merged over the built-in models
    #[serde(default)]
    pub models_file: Option<PathBuf>,
}

fn default_key_prefix() -> String {
    format!("{}/{}", KEY_PREFIX, crate::BRIDGE_NAME)
}

fn default_device() -> String {
    "meter".to_string()
}

fn default_unit_id() -> u8 {
    1
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_read_timeout_ms() -> u64 {
    5000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_abort_cycle_on_failure() -> bool {
    true
}

/// Serial line configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate (default: 9600)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Data bits (default: 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Parity (default: none)
    #[serde(default)]
    pub parity: Parity,
    /// Stop bits: 1 or 2 (default: 1)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::default(),
            stop_bits: default_stop_bits(),
        }
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// Serial parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl EastronBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        let config: EastronBridgeConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// `model` and `serial.port` may be absent here; they are only required
    /// once the bridge starts polling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let meter = &self.eastron;

        if meter.key_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "key_prefix cannot be empty".to_string(),
            ));
        }

        if meter.device.is_empty() || meter.device.contains('/') || meter.device == "@" {
            return Err(ConfigError::Validation(format!(
                "invalid device name '{}'",
                meter.device
            )));
        }

        if meter.unit_id == 0 || meter.unit_id > 247 {
            return Err(ConfigError::Validation(format!(
                "unit_id must be 1-247, got {}",
                meter.unit_id
            )));
        }

        if meter.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if meter.read_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "read_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let serial = &meter.serial;
        if serial.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "serial.baud_rate must be greater than 0".to_string(),
            ));
        }

        if !(5..=8).contains(&serial.data_bits) {
            return Err(ConfigError::Validation(format!(
                "serial.data_bits must be 5-8, got {}",
                serial.data_bits
            )));
        }

        if !(1..=2).contains(&serial.stop_bits) {
            return Err(ConfigError::Validation(format!(
                "serial.stop_bits must be 1 or 2, got {}",
                serial.stop_bits
            )));
        }

        Ok(())
    }
}

impl MeterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
