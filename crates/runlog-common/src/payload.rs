//! Boundary between structured application records and the opaque payloads
//! the log stores. The log never looks inside a payload; these helpers are for
//! callers that want a compact binary encoding without writing one.

use crate::error::LogError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a value to compact binary form (Postcard).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, LogError> {
    postcard::to_allocvec(value).map_err(|e| LogError::Serialization(e.to_string()))
}

/// Reconstructs a value from bytes produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LogError> {
    postcard::from_bytes(bytes).map_err(|e| LogError::Serialization(e.to_string()))
}
