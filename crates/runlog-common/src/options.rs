use crate::error::LogError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Knobs shared by writers and readers of a log file.
///
/// Every field has a default, so a config file only needs to name what it
/// overrides:
///
/// ```json
/// { "sync_on_close": true, "buffer_capacity": 65536 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogOptions {
    /// Push bytes to the OS after every `write`, so tailing readers see them.
    pub flush_on_write: bool,

    /// `fsync` after every `write`.
    pub sync_on_write: bool,

    /// `fsync` when the writer is closed.
    pub sync_on_close: bool,

    /// Reject files whose identification header was not written by this crate.
    pub strict_header: bool,

    /// Size of the in-process write and read buffers.
    pub buffer_capacity: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            flush_on_write: true,
            sync_on_write: false,
            sync_on_close: false,
            strict_header: false,
            buffer_capacity: 32 * 1024,
        }
    }
}

impl LogOptions {
    pub fn from_json_str(json: &str) -> Result<Self, LogError> {
        let options: LogOptions =
            serde_json::from_str(json).map_err(|e| LogError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), LogError> {
        if self.buffer_capacity == 0 {
            return Err(LogError::Config(
                "buffer_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let options = LogOptions::default();
        assert!(options.flush_on_write);
        assert!(!options.sync_on_write);
        assert!(!options.sync_on_close);
        assert!(!options.strict_header);
        assert_eq!(options.buffer_capacity, 32768);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = LogOptions::from_json_str(r#"{ "sync_on_close": true }"#).unwrap();
        assert!(options.sync_on_close);
        assert!(options.flush_on_write);
        assert_eq!(options.buffer_capacity, 32768);
    }

    #[test]
    fn test_rejects_bad_config() {
        let zero = LogOptions::from_json_str(r#"{ "buffer_capacity": 0 }"#);
        assert!(matches!(zero, Err(LogError::Config(_))));

        let unknown = LogOptions::from_json_str(r#"{ "compression": "zstd" }"#);
        assert!(matches!(unknown, Err(LogError::Config(_))));

        let malformed = LogOptions::from_json_str("{ flush_on_write");
        assert!(matches!(malformed, Err(LogError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "strict_header": true, "flush_on_write": false }"#)
            .unwrap();

        let options = LogOptions::from_json_file(file.path()).unwrap();
        assert!(options.strict_header);
        assert!(!options.flush_on_write);
    }
}
