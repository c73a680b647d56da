/// Default key expression prefix for all meterlink states.
pub const KEY_PREFIX: &str = "meterlink";

/// State id of the per-device link-health flag.
pub const CONNECTION_STATE: &str = "info/connection";

/// Builder for the key expressions of one device.
///
/// Keys follow the pattern:
/// - states: `<prefix>/<device>/<state_id>`
/// - definitions: `<prefix>/<device>/@/definitions/<state_id>`
/// - bridge status: `<prefix>/@/status`
#[derive(Debug, Clone)]
pub struct StateKeyBuilder {
    prefix: String,
    device: String,
}

impl StateKeyBuilder {
    /// Create a builder for a device under the given prefix.
    pub fn new(prefix: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            device: device.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Key of a state value.
    ///
    /// # Example
    /// ```
    /// use meterlink_common::keyexpr::StateKeyBuilder;
    ///
    /// let keys = StateKeyBuilder::new("meterlink/eastron", "meter");
    /// assert_eq!(keys.state_key("voltage"), "meterlink/eastron/meter/voltage");
    /// ```
    pub fn state_key(&self, state_id: &str) -> String {
        format!("{}/{}/{}", self.prefix, self.device, state_id)
    }

    /// Key of a state definition.
    ///
    /// # Example
    /// ```
    /// use meterlink_common::keyexpr::StateKeyBuilder;
    ///
    /// let keys = StateKeyBuilder::new("meterlink/eastron", "meter");
    /// assert_eq!(
    ///     keys.definition_key("voltage"),
    ///     "meterlink/eastron/meter/@/definitions/voltage"
    /// );
    /// ```
    pub fn definition_key(&self, state_id: &str) -> String {
        format!("{}/{}/@/definitions/{}", self.prefix, self.device, state_id)
    }

    /// Key of the device's connectivity flag.
    pub fn connection_key(&self) -> String {
        self.state_key(CONNECTION_STATE)
    }

    /// Key of the bridge status message.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder() {
        let keys = StateKeyBuilder::new("meterlink/eastron/", "meter");

        assert_eq!(keys.prefix(), "meterlink/eastron");
        assert_eq!(
            keys.state_key("phase1/voltage"),
            "meterlink/eastron/meter/phase1/voltage"
        );
        assert_eq!(
            keys.connection_key(),
            "meterlink/eastron/meter/info/connection"
        );
        assert_eq!(keys.status_key(), "meterlink/eastron/@/status");
    }
}
