use crate::reader::{Reader, Record, ScanData};
use crate::writer::{WriteResult, Writer};
use runlog_common::{LogError, LogOptions};
use std::path::Path;

enum Mode {
    Idle,
    Writing(Writer),
    Scanning(Reader),
}

/// A log file opened either for writing or for scanning.
///
/// ```no_run
/// use runlog_store::LogStore;
///
/// let mut store = LogStore::default();
/// store.open_for_write("run-1.db")?;
/// store.write(b"step=1 loss=0.5")?;
/// store.close()?;
///
/// store.open_for_scan("run-1.db")?;
/// for payload in store.scan_data()? {
///     println!("{} bytes", payload?.len());
/// }
/// # Ok::<(), runlog_store::LogError>(())
/// ```
pub struct LogStore {
    mode: Mode,
    options: LogOptions,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(LogOptions::default())
    }
}

impl LogStore {
    pub fn new(options: LogOptions) -> Self {
        Self {
            mode: Mode::Idle,
            options,
        }
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }

    /// Creates a fresh log at `path`, closing whatever was open before.
    pub fn open_for_write(&mut self, path: impl AsRef<Path>) -> Result<(), LogError> {
        self.release()?;
        let writer = Writer::open_for_write(path, &self.options)?;
        self.mode = Mode::Writing(writer);
        Ok(())
    }

    pub fn open_for_scan(&mut self, path: impl AsRef<Path>) -> Result<(), LogError> {
        self.release()?;
        let reader = Reader::open_for_scan(path, &self.options)?;
        self.mode = Mode::Scanning(reader);
        Ok(())
    }

    pub fn write(&mut self, payload: &[u8]) -> Result<WriteResult, LogError> {
        match &mut self.mode {
            Mode::Writing(writer) => writer.write(payload),
            _ => Err(LogError::Closed),
        }
    }

    pub fn scan_record(&mut self) -> Result<Option<Record>, LogError> {
        match &mut self.mode {
            Mode::Scanning(reader) => reader.scan_record(),
            _ => Err(LogError::Closed),
        }
    }

    pub fn scan_data(&mut self) -> Result<ScanData<'_>, LogError> {
        match &mut self.mode {
            Mode::Scanning(reader) => Ok(reader.scan_data()),
            _ => Err(LogError::Closed),
        }
    }

    pub fn writer(&mut self) -> Option<&mut Writer> {
        match &mut self.mode {
            Mode::Writing(writer) => Some(writer),
            _ => None,
        }
    }

    pub fn reader(&mut self) -> Option<&mut Reader> {
        match &mut self.mode {
            Mode::Scanning(reader) => Some(reader),
            _ => None,
        }
    }

    pub fn close(&mut self) -> Result<(), LogError> {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Idle => Err(LogError::Closed),
            Mode::Writing(mut writer) => writer.close(),
            Mode::Scanning(mut reader) => reader.close(),
        }
    }

    fn release(&mut self) -> Result<(), LogError> {
        if matches!(self.mode, Mode::Idle) {
            return Ok(());
        }
        self.close()
    }
}
