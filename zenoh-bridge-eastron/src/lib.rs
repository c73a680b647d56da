//! Zenoh bridge for Eastron energy meters.
//!
//! The bridge polls the float registers of an Eastron SDM meter over Modbus
//! RTU and mirrors each reading as a state in the Zenoh key space, together
//! with a debounced link-health flag.
//!
//! # Key Expressions
//!
//! ```text
//! <key_prefix>/<device>/<state>                 readings, e.g. energy/import_active
//! <key_prefix>/<device>/info/connection         link health (boolean)
//! <key_prefix>/<device>/@/definitions/<state>   state metadata
//! <key_prefix>/@/status                         bridge status
//! ```

pub mod catalog;
pub mod config;
pub mod decoder;
pub mod error;
pub mod link;
pub mod poller;
pub mod publisher;
pub mod status;
pub mod transport;

/// Bridge name used in status messages.
pub const BRIDGE_NAME: &str = "eastron";
