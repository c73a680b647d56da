//! Conversion of raw register bytes into engineering values.

use thiserror::Error;

/// Bytes of one IEEE-754 single-precision float.
const FLOAT_BYTES: usize = 4;

/// A response that cannot be turned into a reading.
///
/// Unlike a read error this points at a framing or register-map problem,
/// not at the link.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("response too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("register holds a non-finite value ({0})")]
    NonFinite(f32),
}

/// Decodes big-endian float registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    absolute_value: bool,
}

impl Decoder {
    pub fn new(absolute_value: bool) -> Self {
        Self { absolute_value }
    }

    /// Decode the first four bytes as a big-endian `f32`, rounded to one
    /// decimal place.
    pub fn decode(&self, bytes: &[u8]) -> Result<f64, DecodeError> {
        let word: [u8; FLOAT_BYTES] = bytes
            .get(..FLOAT_BYTES)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::Truncated {
                expected: FLOAT_BYTES,
                actual: bytes.len(),
            })?;

        let raw = f32::from_be_bytes(word);
        if !raw.is_finite() {
            return Err(DecodeError::NonFinite(raw));
        }

        let value = round_to_tenth(f64::from(raw));
        Ok(if self.absolute_value { value.abs() } else { value })
    }
}

/// Round half away from zero to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Big-endian bytes of a sequence of 16-bit registers.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
