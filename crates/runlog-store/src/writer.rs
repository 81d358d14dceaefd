use crate::chunk::{self, ChunkHeader, ChunkType, FileHeader, Step, FILE_HEADER_SIZE};
use crate::recovery::{self, Tail};
use runlog_common::{LogError, LogOptions};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

const ZEROS: [u8; chunk::HEADER_SIZE] = [0; chunk::HEADER_SIZE];

/// File growth caused by one `write` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub offset_before: u64,
    pub offset_after: u64,
    /// Zero bytes emitted to skip the tail of a block.
    pub padding_bytes: u32,
}

/// The single appender of a log file.
pub struct Writer {
    file: Option<BufWriter<File>>,
    path: PathBuf,
    /// Logical end of file, including bytes still in the buffer.
    offset: u64,
    options: LogOptions,
}

impl Writer {
    /// Creates (or truncates) `path` and writes the identification header.
    pub fn open_for_write(path: impl AsRef<Path>, options: &LogOptions) -> Result<Self, LogError> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut file = BufWriter::with_capacity(options.buffer_capacity, file);
        file.write_all(&FileHeader::current().encode())?;
        file.flush()?;

        info!(path = %path.display(), "opened log for write");
        Ok(Self {
            file: Some(file),
            path,
            offset: FILE_HEADER_SIZE as u64,
            options: options.clone(),
        })
    }

    /// Reopens an existing log and continues appending at its end.
    ///
    /// The tail must be clean; run [`recovery::repair`] first on a file left
    /// behind by a crashed writer.
    pub fn open_for_append(path: impl AsRef<Path>, options: &LogOptions) -> Result<Self, LogError> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let report = recovery::inspect(&path, options)?;
        if report.tail != Tail::Clean {
            return Err(LogError::DirtyTail {
                valid_len: report.valid_len,
                file_len: report.file_len,
            });
        }

        let file = OpenOptions::new().append(true).open(&path)?;
        info!(
            path = %path.display(),
            offset = report.file_len,
            records = report.records,
            "opened log for append"
        );
        Ok(Self {
            file: Some(BufWriter::with_capacity(options.buffer_capacity, file)),
            path,
            offset: report.file_len,
            options: options.clone(),
        })
    }

    /// Appends one logical record.
    ///
    /// Any I/O error closes the writer: the bytes that reached the file no
    /// longer match the cursor, so later calls fail with `Closed`. Continue
    /// with [`recovery::repair`] and [`Writer::open_for_append`].
    pub fn write(&mut self, payload: &[u8]) -> Result<WriteResult, LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        let offset_before = self.offset;

        let written = append_record(file, offset_before, payload)
            .and_then(|step| finish_write(file, &self.options).map(|_| step));
        let (offset_after, padding_bytes) = match written {
            Ok(step) => step,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    offset = offset_before,
                    error = %e,
                    "write failed, closing log writer"
                );
                self.file = None;
                return Err(e.into());
            }
        };
        self.offset = offset_after;

        let result = WriteResult {
            offset_before,
            offset_after,
            padding_bytes,
        };
        trace!(
            len = payload.len(),
            offset = result.offset_before,
            padding = result.padding_bytes,
            "appended record"
        );
        Ok(result)
    }

    /// Pushes buffered bytes to the OS so readers can see them.
    pub fn flush(&mut self) -> Result<(), LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        file.flush()?;
        Ok(())
    }

    /// Flushes and asks the OS to persist the file contents.
    pub fn sync(&mut self) -> Result<(), LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        file.flush()?;
        file.get_ref().sync_data()?;
        Ok(())
    }

    /// Current end of the log, counting bytes not yet flushed.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn close(&mut self) -> Result<(), LogError> {
        let mut file = self.file.take().ok_or(LogError::Closed)?;
        file.flush()?;
        if self.options.sync_on_close {
            file.get_ref().sync_all()?;
        }
        debug!(path = %self.path.display(), offset = self.offset, "closed log writer");
        Ok(())
    }
}

/// Emits the padding and chunks of one record starting at file offset
/// `start`. Returns the end offset and the padding written.
fn append_record(sink: &mut impl Write, start: u64, payload: &[u8]) -> io::Result<(u64, u32)> {
    let mut offset = start;
    let mut padding_bytes = 0u32;
    let mut rest = payload;
    let mut is_first = true;

    loop {
        match chunk::split(chunk::block_remaining(offset), rest.len(), is_first) {
            Step::Pad(n) => {
                sink.write_all(&ZEROS[..n])?;
                offset += n as u64;
                padding_bytes += n as u32;
            }
            Step::Chunk { kind, len } => {
                let (fragment, tail) = rest.split_at(len);
                sink.write_all(&ChunkHeader::new(kind, fragment).encode())?;
                sink.write_all(fragment)?;
                offset += (chunk::HEADER_SIZE + len) as u64;
                rest = tail;
                is_first = false;

                if matches!(kind, ChunkType::Full | ChunkType::Last) {
                    return Ok((offset, padding_bytes));
                }
            }
        }
    }
}

fn finish_write(file: &mut BufWriter<File>, options: &LogOptions) -> io::Result<()> {
    if options.flush_on_write || options.sync_on_write {
        file.flush()?;
    }
    if options.sync_on_write {
        file.get_ref().sync_data()?;
    }
    Ok(())
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            // Errors cannot surface from drop; callers wanting them use close()
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{BLOCK_SIZE, HEADER_SIZE};

    /// Accepts `limit` bytes, then reports a full disk.
    struct LimitedSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.written.len();
            if room == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_append_record_layout() {
        let mut sink = Vec::new();
        let start = (BLOCK_SIZE - 10) as u64;
        let (end, padding) = append_record(&mut sink, start, &[5; 4]).unwrap();

        // 10 bytes left: FIRST with 3 bytes, then LAST with 1 in the next block
        assert_eq!(end, (BLOCK_SIZE + HEADER_SIZE + 1) as u64);
        assert_eq!(padding, 0);
        assert_eq!(sink.len() as u64, end - start);
        assert_eq!(sink[6], ChunkType::First as u8);
        assert_eq!(sink[10 + 6], ChunkType::Last as u8);
    }

    #[test]
    fn test_append_record_fails_mid_fragment() {
        // Room for the header and 3 of the 10 data bytes
        let mut sink = LimitedSink {
            written: Vec::new(),
            limit: HEADER_SIZE + 3,
        };
        let result = append_record(&mut sink, FILE_HEADER_SIZE as u64, &[1; 10]);
        assert!(result.is_err());
        assert_eq!(sink.written.len(), HEADER_SIZE + 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_closes_writer() {
        let path = Path::new("/dev/full");
        if !path.exists() {
            return;
        }

        // Every write to /dev/full fails with ENOSPC once it reaches the device
        let file = OpenOptions::new().write(true).open(path).unwrap();
        let options = LogOptions::default();
        let mut writer = Writer {
            file: Some(BufWriter::with_capacity(options.buffer_capacity, file)),
            path: path.to_path_buf(),
            offset: FILE_HEADER_SIZE as u64,
            options,
        };

        assert!(matches!(writer.write(b"step=1"), Err(LogError::Io(_))));
        assert!(writer.is_closed());
        assert_eq!(writer.offset(), FILE_HEADER_SIZE as u64);
        assert!(matches!(writer.write(b"step=2"), Err(LogError::Closed)));
        assert!(matches!(writer.close(), Err(LogError::Closed)));
    }
}
