//! Bridge status, published to `<key_prefix>/@/status`.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the bridge process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Running,
    Offline,
    /// Startup failed; polling never began.
    Error,
}

/// The meter a running bridge polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterInfo {
    pub device: String,
    pub model: String,
    pub registers: usize,
    pub port: String,
    pub unit_id: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    pub status: BridgeState,
    #[serde(flatten)]
    pub meter: Option<MeterInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeStatus {
    pub fn running(version: impl Into<String>, meter: MeterInfo) -> Self {
        Self {
            meter: Some(meter),
            ..Self::new(version, BridgeState::Running)
        }
    }

    pub fn offline(version: impl Into<String>) -> Self {
        Self::new(version, BridgeState::Offline)
    }

    pub fn failed(version: impl Into<String>, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(version, BridgeState::Error)
        }
    }

    fn new(version: impl Into<String>, status: BridgeState) -> Self {
        Self {
            bridge: crate::BRIDGE_NAME.to_string(),
            version: version.into(),
            status,
            meter: None,
            error: None,
        }
    }
}
