//! Meterlink Common Library
//!
//! Shared building blocks for meterlink bridges, which mirror field devices
//! into a Zenoh key space as named states:
//!
//! - [`state`] - State-store data model (`StateRecord`, `StateValue`, `StateDefinition`)
//! - [`serialization`] - JSON/CBOR payload encoding
//! - [`config`] - Zenoh and logging configuration blocks
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - State key builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod state;

pub use config::{LogFormat, LoggingConfig, ZenohConfig};
pub use error::{Error, Result};
pub use keyexpr::{CONNECTION_STATE, KEY_PREFIX, StateKeyBuilder};
pub use serialization::{Format, encode};
pub use session::connect;
pub use state::{StateDefinition, StateRecord, StateRole, StateValue, ValueType, current_timestamp_millis};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
///
/// # Example
///
/// ```ignore
/// use meterlink_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
