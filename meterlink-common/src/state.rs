//! State-store data model.
//!
//! A *state* is a named value under a device namespace. Each state has a
//! [`StateDefinition`] describing its type and unit, published once, and a
//! stream of [`StateRecord`] writes.

use serde::{Deserialize, Serialize};

/// A single write to a named state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateRecord {
    /// Unix epoch milliseconds when the value was produced.
    pub timestamp: i64,

    /// Device identifier (e.g., "meter", "sdm630-garage").
    pub source: String,

    /// State id relative to the device (e.g., "voltage", "phase1/current").
    pub state: String,

    /// The written value.
    pub value: StateValue,

    /// `true` for a confirmed reading, `false` for a pending command.
    pub ack: bool,
}

impl StateRecord {
    /// Create a new acknowledged record with the current timestamp.
    pub fn new(source: impl Into<String>, state: impl Into<String>, value: StateValue) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            source: source.into(),
            state: state.into(),
            value,
            ack: true,
        }
    }

    /// Set the acknowledged flag.
    pub fn with_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }
}

/// Typed state value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StateValue {
    Boolean(bool),
    Number(f64),
}

impl StateValue {
    /// The value type this value belongs to.
    pub fn value_type(&self) -> ValueType {
        match self {
            StateValue::Boolean(_) => ValueType::Boolean,
            StateValue::Number(_) => ValueType::Number,
        }
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Number(v)
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Boolean(v)
    }
}

/// Declared type of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
}

/// Role hint for consumers rendering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateRole {
    /// Generic measured variable.
    #[serde(rename = "variable")]
    Variable,
    /// Link-health flag of the bridge to its device.
    #[serde(rename = "indicator.connected")]
    IndicatorConnected,
}

/// Metadata describing a state, published once before (or alongside) its
/// first write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateDefinition {
    /// State id relative to the device.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Declared value type.
    #[serde(rename = "type")]
    pub value_type: ValueType,

    pub role: StateRole,

    /// Unit of measurement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    pub read: bool,
    pub write: bool,

    /// Initial value consumers should assume before the first write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<StateValue>,

    /// Protocol-specific details (e.g., register address).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub native: serde_json::Value,
}

impl StateDefinition {
    /// A read-only numeric measurement.
    pub fn number(id: impl Into<String>, name: impl Into<String>, unit: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value_type: ValueType::Number,
            role: StateRole::Variable,
            unit: unit.filter(|u| !u.is_empty()),
            read: true,
            write: false,
            default: None,
            native: serde_json::Value::Null,
        }
    }

    /// The boolean connectivity indicator, defaulting to `false`.
    pub fn connection_indicator(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value_type: ValueType::Boolean,
            role: StateRole::IndicatorConnected,
            unit: None,
            read: true,
            write: false,
            default: Some(StateValue::Boolean(false)),
            native: serde_json::Value::Null,
        }
    }

    /// Attach protocol-specific details.
    pub fn with_native(mut self, native: serde_json::Value) -> Self {
        self.native = native;
        self
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
