//! # JSON Helpers
//!
//! SIMD-accelerated parsing for request bodies with serde-based
//! serialization for responses.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into a typed value
///
/// # Errors
///
/// Returns [`Error::Json`] when the input is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    simd_json::from_slice(&mut bytes).map_err(|e| Error::Json {
        message: e.to_string(),
    })
}

/// Parse JSON bytes in place into a typed value
///
/// Avoids the copy `parse_json` makes; the buffer is clobbered.
///
/// # Errors
///
/// Returns [`Error::Json`] when the input is not valid JSON for `T`.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::Json {
        message: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns [`Error::Json`] when the value cannot be serialized.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Json {
        message: e.to_string(),
    })
}
