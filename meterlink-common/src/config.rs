//! Configuration blocks shared by every meterlink process.
//!
//! Each process embeds these in its own JSON5 file and loads the whole file
//! itself.

use serde::{Deserialize, Serialize};

/// How to join the Zenoh network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenohConfig {
    /// `peer`, `client` or `router`.
    pub mode: String,
    pub connect: Vec<String>,
    pub listen: Vec<String>,
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: "peer".to_string(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Tracing setup. `level` accepts any `EnvFilter` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Replace the level with a command-line override, keeping the format.
    pub fn with_level_override(&self, level: Option<&str>) -> Self {
        let mut config = self.clone();
        if let Some(level) = level {
            config.level = level.to_string();
        }
        config
    }
}
