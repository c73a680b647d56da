//! Writing states to the Zenoh key space.

use crate::status::BridgeStatus;
use async_trait::async_trait;
use meterlink_common::{
    CONNECTION_STATE, Format, StateDefinition, StateKeyBuilder, StateRecord, StateValue, encode,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use zenoh::Session;

/// Errors while writing to the state store.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Failed to publish to {key}: {message}")]
    Put { key: String, message: String },
}

/// Sink for meter states.
///
/// Every method may be called before the matching definition was ensured.
#[async_trait]
pub trait StatePublisher: Send {
    /// Publish a state's metadata; repeated calls for the same id are no-ops.
    async fn ensure_state_definition(
        &mut self,
        definition: &StateDefinition,
    ) -> Result<(), PublishError>;

    /// Write a numeric reading.
    async fn publish(
        &mut self,
        state_id: &str,
        value: f64,
        acknowledged: bool,
    ) -> Result<(), PublishError>;

    /// Write the link-health flag.
    async fn publish_connectivity(&mut self, connected: bool) -> Result<(), PublishError>;
}

/// Definition of the connectivity flag.
pub fn connection_definition() -> StateDefinition {
    StateDefinition::connection_indicator(CONNECTION_STATE, "If connected to the meter")
}

/// [`StatePublisher`] backed by a Zenoh session.
#[derive(Debug)]
pub struct ZenohStatePublisher {
    session: Arc<Session>,
    keys: StateKeyBuilder,
    format: Format,
    defined: HashSet<String>,
}

impl ZenohStatePublisher {
    pub fn new(session: Arc<Session>, keys: StateKeyBuilder, format: Format) -> Self {
        Self {
            session,
            keys,
            format,
            defined: HashSet::new(),
        }
    }

    /// Publish the bridge status as JSON to `<prefix>/@/status`.
    pub async fn publish_status(&self, status: &BridgeStatus) -> Result<(), PublishError> {
        self.put_encoded(self.keys.status_key(), status, Format::Json)
            .await
    }

    async fn put_encoded<T: serde::Serialize>(
        &self,
        key: String,
        value: &T,
        format: Format,
    ) -> Result<(), PublishError> {
        let payload =
            encode(value, format).map_err(|e| PublishError::Serialization(e.to_string()))?;

        self.session
            .put(&key, payload)
            .encoding(format.mime_type())
            .await
            .map_err(|e| PublishError::Put {
                key: key.clone(),
                message: e.to_string(),
            })?;

        debug!(key = %key, "Published");
        Ok(())
    }

    fn record(&self, state_id: &str, value: StateValue, acknowledged: bool) -> StateRecord {
        StateRecord::new(self.keys.device(), state_id, value).with_ack(acknowledged)
    }
}

#[async_trait]
impl StatePublisher for ZenohStatePublisher {
    async fn ensure_state_definition(
        &mut self,
        definition: &StateDefinition,
    ) -> Result<(), PublishError> {
        if self.defined.contains(&definition.id) {
            return Ok(());
        }

        self.put_encoded(
            self.keys.definition_key(&definition.id),
            definition,
            self.format,
        )
        .await?;
        self.defined.insert(definition.id.clone());
        Ok(())
    }

    async fn publish(
        &mut self,
        state_id: &str,
        value: f64,
        acknowledged: bool,
    ) -> Result<(), PublishError> {
        let record = self.record(state_id, StateValue::Number(value), acknowledged);
        self.put_encoded(self.keys.state_key(state_id), &record, self.format)
            .await
    }

    async fn publish_connectivity(&mut self, connected: bool) -> Result<(), PublishError> {
        let record = self.record(CONNECTION_STATE, StateValue::Boolean(connected), true);
        self.put_encoded(self.keys.connection_key(), &record, self.format)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterlink_common::{StateRole, ValueType};

    #[test]
    fn test_connection_definition() {
        let definition = connection_definition();
        assert_eq!(definition.id, "info/connection");
        assert_eq!(definition.value_type, ValueType::Boolean);
        assert_eq!(definition.role, StateRole::IndicatorConnected);
        assert_eq!(definition.default, Some(StateValue::Boolean(false)));
    }
}
