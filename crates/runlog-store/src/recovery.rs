//! Crash recovery: find where the last complete record ends and, on request,
//! cut off whatever a crashed writer left half-written after it.

use crate::reader::{Reader, ScanState};
use runlog_common::{CorruptReason, LogError, LogOptions};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// The file ends exactly after a complete record.
    Clean,
    /// Bytes of an unfinished record follow the last complete one.
    Partial,
    Corrupt { offset: u64, reason: CorruptReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Complete records before `valid_len`.
    pub records: u64,
    /// End of the last complete record.
    pub valid_len: u64,
    pub file_len: u64,
    pub tail: Tail,
}

/// Scans the whole file without modifying it.
pub fn inspect(path: impl AsRef<Path>, options: &LogOptions) -> Result<RecoveryReport, LogError> {
    let path = path.as_ref();
    let mut reader = Reader::open_for_scan(path, options)?;
    let mut records = 0u64;

    let tail = loop {
        match reader.scan_record() {
            Ok(Some(_)) => records += 1,
            Ok(None) if reader.state() == ScanState::EofClean => break Tail::Clean,
            Ok(None) => break Tail::Partial,
            Err(LogError::Corrupt { offset, reason }) => break Tail::Corrupt { offset, reason },
            Err(e) => return Err(e),
        }
    };

    let file_len = std::fs::metadata(path)?.len();
    Ok(RecoveryReport {
        records,
        valid_len: reader.offset(),
        file_len,
        tail,
    })
}

/// Truncates a partial tail so the file ends after its last complete record.
///
/// Returns the report taken before truncation. Corrupt files are left alone
/// and reported as an error.
pub fn repair(path: impl AsRef<Path>, options: &LogOptions) -> Result<RecoveryReport, LogError> {
    let path = path.as_ref();
    let report = inspect(path, options)?;

    match report.tail {
        Tail::Clean => {}
        Tail::Partial => {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(report.valid_len)?;
            file.sync_all()?;
            info!(
                path = %path.display(),
                dropped = report.file_len - report.valid_len,
                valid_len = report.valid_len,
                "truncated partial tail"
            );
        }
        Tail::Corrupt { offset, reason } => {
            warn!(path = %path.display(), offset, %reason, "refusing to repair corrupt log");
            return Err(LogError::Corrupt { offset, reason });
        }
    }
    Ok(report)
}
