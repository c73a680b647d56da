//! Serial Modbus transport.
//!
//! Framing is handled by `tokio-modbus`; this module opens the serial line,
//! bounds every request with a timeout and classifies failures.

use crate::catalog::RegisterFunction;
use crate::config::{Parity, SerialConfig};
use crate::decoder::words_to_bytes;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Fatal errors while opening the link at startup.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no serial port configured")]
    NoPort,
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },
}

/// Recoverable errors of a single register read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Request/response access to the meter's registers.
///
/// Implementations perform exactly one attempt per call.
#[async_trait]
pub trait Transport: Send {
    /// Read `word_count` registers starting at `address`, returning the
    /// words as big-endian bytes.
    async fn read_registers(
        &mut self,
        function: RegisterFunction,
        address: u16,
        word_count: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ReadError>;

    /// Release the underlying link. Errors are logged, not returned.
    async fn disconnect(&mut self);
}

/// Modbus RTU over a serial line.
pub struct RtuTransport {
    ctx: Context,
    port: String,
}

impl RtuTransport {
    /// Open the serial port and attach a client for `unit_id`.
    pub fn connect(serial: &SerialConfig, unit_id: u8) -> Result<Self, ConnectError> {
        let port = serial.port.clone().ok_or(ConnectError::NoPort)?;

        let parity = match serial.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        };

        let stop_bits = match serial.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        let data_bits = match serial.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };

        info!(
            port = %port,
            baud_rate = serial.baud_rate,
            unit_id,
            "Opening serial link"
        );

        let builder = tokio_serial::new(&port, serial.baud_rate)
            .parity(parity)
            .stop_bits(stop_bits)
            .data_bits(data_bits);

        let stream = tokio_serial::SerialStream::open(&builder).map_err(|source| {
            ConnectError::Open {
                port: port.clone(),
                source,
            }
        })?;

        let ctx = rtu::attach_slave(stream, Slave(unit_id));
        Ok(Self { ctx, port })
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

#[async_trait]
impl Transport for RtuTransport {
    async fn read_registers(
        &mut self,
        function: RegisterFunction,
        address: u16,
        word_count: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ReadError> {
        let request = async {
            match function {
                RegisterFunction::Input => self.ctx.read_input_registers(address, word_count).await,
                RegisterFunction::Holding => {
                    self.ctx.read_holding_registers(address, word_count).await
                }
            }
        };

        let words = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| ReadError::Timeout(timeout))?
            .map_err(|e| classify_transport_error(e, timeout))?
            .map_err(|code| ReadError::Protocol(format!("exception: {:?}", code)))?;

        if words.len() != usize::from(word_count) {
            return Err(ReadError::Protocol(format!(
                "expected {} words, got {}",
                word_count,
                words.len()
            )));
        }

        debug!(address, function = function.as_str(), ?words, "Response received");
        Ok(words_to_bytes(&words))
    }

    async fn disconnect(&mut self) {
        match self.ctx.disconnect().await {
            Ok(()) => info!(port = %self.port, "Serial link closed"),
            Err(e) => warn!(port = %self.port, error = %e, "Failed to close serial link"),
        }
    }
}

fn classify_transport_error(error: tokio_modbus::Error, timeout: Duration) -> ReadError {
    match error {
        tokio_modbus::Error::Transport(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            ReadError::Timeout(timeout)
        }
        other => ReadError::Protocol(other.to_string()),
    }
}
