use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Log is closed or not open for this operation")]
    Closed,

    #[error("Truncated identification header: file holds {len} of 7 bytes")]
    TruncatedHeader { len: u64 },

    #[error("Unrecognized identification header")]
    UnrecognizedHeader,

    #[error("Corrupt chunk at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: CorruptReason },

    #[error("Log tail is not clean: {valid_len} valid of {file_len} bytes")]
    DirtyTail { valid_len: u64, file_len: u64 },

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl LogError {
    /// True for damage found in a fully present chunk, as opposed to I/O or usage errors.
    pub fn is_corruption(&self) -> bool {
        matches!(self, LogError::Corrupt { .. })
    }
}

/// Why a complete chunk was rejected by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptReason {
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Declared length runs past the end of the block.
    LengthOverrun { length: u16, available: usize },
    UnknownType(u8),
    /// A chunk type that cannot appear at this point of a record.
    OutOfSequence { kind: u8, in_record: bool },
}

impl fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptReason::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch (stored {:#010x}, computed {:#010x})",
                expected, actual
            ),
            CorruptReason::LengthOverrun { length, available } => write!(
                f,
                "length {} overruns block ({} bytes available)",
                length, available
            ),
            CorruptReason::UnknownType(kind) => write!(f, "unknown chunk type {}", kind),
            CorruptReason::OutOfSequence { kind, in_record } => {
                if *in_record {
                    write!(f, "chunk type {} inside an unfinished record", kind)
                } else {
                    write!(f, "chunk type {} without a preceding FIRST", kind)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation_and_display() {
        let io_err = LogError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO Error"));
        assert!(io_err.to_string().contains("file not found"));

        let missing = LogError::NotFound(PathBuf::from("/tmp/run-1.db"));
        assert!(missing.to_string().contains("/tmp/run-1.db"));

        let truncated = LogError::TruncatedHeader { len: 3 };
        assert!(truncated.to_string().contains("3 of 7"));

        let corrupt = LogError::Corrupt {
            offset: 32768,
            reason: CorruptReason::ChecksumMismatch {
                expected: 1,
                actual: 2,
            },
        };
        assert!(corrupt.to_string().contains("offset 32768"));
        assert!(corrupt.to_string().contains("checksum mismatch"));

        let dirty = LogError::DirtyTail {
            valid_len: 100,
            file_len: 103,
        };
        assert!(dirty.to_string().contains("100 valid of 103"));
    }

    #[test]
    fn test_io_not_found_stays_io() {
        // `NotFound` is reserved for a missing log file; a bare conversion keeps
        // the I/O error and its kind
        let log_error: LogError = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(matches!(&log_error, LogError::Io(e) if e.kind() == io::ErrorKind::NotFound));
        assert!(!log_error.is_corruption());
    }

    #[test]
    fn test_corruption_is_distinct() {
        let corrupt = LogError::Corrupt {
            offset: 7,
            reason: CorruptReason::UnknownType(9),
        };
        assert!(corrupt.is_corruption());
        assert!(!LogError::Closed.is_corruption());
        assert!(!LogError::TruncatedHeader { len: 0 }.is_corruption());
    }

    #[test]
    fn test_reason_display() {
        let overrun = CorruptReason::LengthOverrun {
            length: 40000,
            available: 100,
        };
        assert!(overrun.to_string().contains("40000"));

        let orphan = CorruptReason::OutOfSequence {
            kind: 4,
            in_record: false,
        };
        assert!(orphan.to_string().contains("without a preceding FIRST"));

        let nested = CorruptReason::OutOfSequence {
            kind: 1,
            in_record: true,
        };
        assert!(nested.to_string().contains("unfinished record"));
    }
}
