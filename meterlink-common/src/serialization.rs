//! Payload encoding of state records and definitions.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire format of published payloads. JSON unless configured otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Cbor,
}

impl Format {
    /// Zenoh encoding / MIME type attached to each put.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }
}

pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => Ok(serde_json::to_vec(value)?),
        Format::Cbor => {
            let mut payload = Vec::new();
            ciborium::into_writer(value, &mut payload)?;
            Ok(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StateRecord, StateValue};

    fn voltage() -> StateRecord {
        StateRecord::new("meter", "voltage", StateValue::Number(230.0))
    }

    #[test]
    fn test_json_payload_shape() {
        let encoded = encode(&voltage(), Format::Json).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(json["source"], "meter");
        assert_eq!(json["state"], "voltage");
        assert_eq!(json["value"], 230.0);
        assert_eq!(json["ack"], true);
    }

    #[test]
    fn test_cbor_record() {
        let record = voltage();
        let encoded = encode(&record, Format::Cbor).unwrap();
        assert_ne!(encoded.first(), Some(&b'{'));

        let decoded: StateRecord = ciborium::from_reader(encoded.as_slice()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_boolean_value_survives_json() {
        let record = StateRecord::new("meter", "info/connection", StateValue::Boolean(false));
        let encoded = encode(&record, Format::Json).unwrap();
        let decoded: StateRecord = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.value, StateValue::Boolean(false));
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(Format::Json.mime_type(), "application/json");
        assert_eq!(Format::Cbor.mime_type(), "application/cbor");
    }
}
