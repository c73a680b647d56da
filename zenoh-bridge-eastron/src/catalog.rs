//! Device model catalog: which registers a meter model exposes and how to
//! name them.

use crate::error::BridgeError;
use meterlink_common::StateDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Built-in catalog, embedded at compile time.
const BUILTIN_MODELS: &str = include_str!("../models.json5");

/// Number of 16-bit words holding one 32-bit float.
pub const FLOAT_WORDS: u16 = 2;

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read model catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse model catalog: {0}")]
    Parse(#[from] json5::Error),
    #[error("Model '{model}': duplicate register label '{label}'")]
    DuplicateLabel { model: String, label: String },
    #[error("Model '{model}' has no registers")]
    EmptyModel { model: String },
    #[error("Model '{model}': register '{label}' must span 2 words, got {word_count}")]
    InvalidWordCount {
        model: String,
        label: String,
        word_count: u16,
    },
}

/// Modbus function used to read a register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterFunction {
    /// Input registers, function code 0x04 (default)
    #[default]
    Input,
    /// Holding registers, function code 0x03
    Holding,
}

impl RegisterFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterFunction::Input => "input",
            RegisterFunction::Holding => "holding",
        }
    }
}

/// One register to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDescriptor {
    /// Register offset (0-based)
    pub address: u16,

    /// Number of 16-bit words to read
    #[serde(default = "default_word_count")]
    pub word_count: u16,

    /// Identifier of the published state, unique within a model
    pub label: String,

    /// Unit of measurement
    #[serde(default)]
    pub unit: String,

    /// Optional namespace the state is published under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub function: RegisterFunction,
}

fn default_word_count() -> u16 {
    FLOAT_WORDS
}

impl RegisterDescriptor {
    /// Create an input register spanning one float.
    pub fn new(address: u16, label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            address,
            word_count: FLOAT_WORDS,
            label: label.into(),
            unit: unit.into(),
            group: None,
            function: RegisterFunction::Input,
        }
    }

    /// Place the register's state under a group namespace.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// State id relative to the device: `group/label`, or `label`.
    pub fn state_id(&self) -> String {
        match &self.group {
            Some(group) => format!("{}/{}", group, self.label),
            None => self.label.clone(),
        }
    }

    /// State definition published before the first value.
    pub fn definition(&self) -> StateDefinition {
        StateDefinition::number(self.state_id(), &self.label, Some(self.unit.clone())).with_native(
            serde_json::json!({
                "address": self.address,
                "word_count": self.word_count,
                "function": self.function.as_str(),
            }),
        )
    }
}

/// A named, ordered register map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceModel {
    pub name: String,
    pub registers: Vec<RegisterDescriptor>,
}

impl DeviceModel {
    /// Build a model, checking label uniqueness and word counts.
    pub fn new(
        name: impl Into<String>,
        registers: Vec<RegisterDescriptor>,
    ) -> Result<Self, CatalogError> {
        let name = name.into();

        if registers.is_empty() {
            return Err(CatalogError::EmptyModel { model: name });
        }

        let mut seen = HashSet::new();
        for register in &registers {
            if register.word_count != FLOAT_WORDS {
                return Err(CatalogError::InvalidWordCount {
                    model: name,
                    label: register.label.clone(),
                    word_count: register.word_count,
                });
            }
            if !seen.insert(register.label.as_str()) {
                return Err(CatalogError::DuplicateLabel {
                    model: name,
                    label: register.label.clone(),
                });
            }
        }

        Ok(Self { name, registers })
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Mapping from model name to register map.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, DeviceModel>,
}

impl ModelCatalog {
    /// The catalog shipped with the bridge.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json5(BUILTIN_MODELS)
    }

    /// Parse a catalog of the form `{ MODEL: [register, ...], ... }`.
    pub fn from_json5(content: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, Vec<RegisterDescriptor>> = json5::from_str(content)?;

        let models: BTreeMap<String, DeviceModel> = raw
            .into_iter()
            .map(|(name, registers)| {
                DeviceModel::new(name.clone(), registers).map(|model| (name, model))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { models })
    }

    /// Load a catalog from a JSON5 file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Add the models of `other`, replacing models with the same name.
    pub fn merge(&mut self, other: ModelCatalog) {
        self.models.extend(other.models);
    }

    /// The built-in catalog, extended by `models_file` when one is given.
    pub fn with_overrides(models_file: Option<&Path>) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin()?;
        if let Some(path) = models_file {
            catalog.merge(Self::load_file(path)?);
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&DeviceModel> {
        self.models.get(name)
    }

    /// Resolve the configured model name.
    pub fn select(&self, name: Option<&str>) -> Result<&DeviceModel, BridgeError> {
        let available = || -> Vec<String> {
            self.list_models().into_iter().map(String::from).collect()
        };

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BridgeError::NoModelSelected {
                available: available(),
            })?;

        self.get(name).ok_or_else(|| BridgeError::UnknownModel {
            model: name.to_string(),
            available: available(),
        })
    }

    /// Names of all models, sorted.
    pub fn list_models(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ModelCatalog::builtin().unwrap();

        assert_eq!(
            catalog.list_models(),
            vec!["SDM120", "SDM220", "SDM230", "SDM630", "SDM72D"]
        );

        let sdm120 = catalog.get("SDM120").unwrap();
        assert_eq!(sdm120.registers[0], RegisterDescriptor::new(0, "voltage", "V"));
        assert!(
            sdm120
                .registers
                .iter()
                .all(|r| r.function == RegisterFunction::Input)
        );
    }

    #[test]
    fn test_state_id_uses_group() {
        let plain = RegisterDescriptor::new(70, "frequency", "Hz");
        assert_eq!(plain.state_id(), "frequency");

        let grouped = RegisterDescriptor::new(72, "import_active", "kWh").in_group("energy");
        assert_eq!(grouped.state_id(), "energy/import_active");
    }

    #[test]
    fn test_definition_metadata() {
        let register = RegisterDescriptor::new(342, "total_active", "kWh").in_group("energy");
        let definition = register.definition();

        assert_eq!(definition.id, "energy/total_active");
        assert_eq!(definition.name, "total_active");
        assert_eq!(definition.unit.as_deref(), Some("kWh"));
        assert_eq!(definition.native["address"], 342);
        assert_eq!(definition.native["function"], "input");
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let json = r#"{
            BAD: [
                { address: 0, label: "voltage", unit: "V" },
                { address: 2, label: "voltage", unit: "V", group: "other" },
            ]
        }"#;

        let err = ModelCatalog::from_json5(json).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateLabel { ref label, .. } if label == "voltage"));
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = ModelCatalog::from_json5("{ EMPTY: [] }").unwrap_err();
        assert!(matches!(err, CatalogError::EmptyModel { .. }));
    }

    #[test]
    fn test_word_count_must_hold_a_float() {
        let json = r#"{ M: [ { address: 0, label: "x", word_count: 1 } ] }"#;
        let err = ModelCatalog::from_json5(json).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidWordCount { word_count: 1, .. }));
    }

    #[test]
    fn test_merge_overrides_by_name() {
        let mut catalog = ModelCatalog::builtin().unwrap();
        let custom = ModelCatalog::from_json5(
            r#"{
                SDM120: [ { address: 0, label: "voltage", unit: "V" } ],
                CUSTOM: [ { address: 4, label: "power", unit: "W", function: "holding" } ],
            }"#,
        )
        .unwrap();

        catalog.merge(custom);

        assert_eq!(catalog.get("SDM120").unwrap().len(), 1);
        assert_eq!(
            catalog.get("CUSTOM").unwrap().registers[0].function,
            RegisterFunction::Holding
        );
        assert_eq!(catalog.len(), 6);
    }

    #[test]
    fn test_select_model() {
        let catalog = ModelCatalog::builtin().unwrap();

        assert_eq!(catalog.select(Some("SDM630")).unwrap().name, "SDM630");
        assert!(catalog.get("SDM999").is_none());

        match catalog.select(Some("SDM999")) {
            Err(BridgeError::UnknownModel { model, available }) => {
                assert_eq!(model, "SDM999");
                assert_eq!(available.len(), 5);
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            catalog.select(None),
            Err(BridgeError::NoModelSelected { .. })
        ));
        assert!(matches!(
            catalog.select(Some("")),
            Err(BridgeError::NoModelSelected { .. })
        ));
    }

    #[test]
    fn test_with_overrides_missing_file() {
        let result = ModelCatalog::with_overrides(Some(Path::new("/nonexistent/models.json5")));
        assert!(matches!(result, Err(CatalogError::Io(_))));
        assert_eq!(ModelCatalog::with_overrides(None).unwrap().len(), 5);
    }
}
