//! Startup errors of the bridge.

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::transport::ConnectError;
use thiserror::Error;

/// Errors that prevent the bridge from starting to poll.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no device model selected (available: {})", .available.join(", "))]
    NoModelSelected { available: Vec<String> },

    #[error("unknown device model '{model}' (available: {})", .available.join(", "))]
    UnknownModel {
        model: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),
}
