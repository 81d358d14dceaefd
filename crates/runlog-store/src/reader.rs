use crate::chunk::{self, ChunkHeader, ChunkType, FileHeader, FILE_HEADER_SIZE, HEADER_SIZE};
use runlog_common::{CorruptReason, LogError, LogOptions};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// One reassembled logical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Type of the chunk that completed the record: `FULL` or `LAST`.
    pub kind: u8,
    pub data: Vec<u8>,
}

/// Outcome of the most recent scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Reading,
    /// Nothing left after the last complete record.
    EofClean,
    /// A record has started but is not fully on disk yet. Retry later.
    EofPartial,
    /// A complete chunk failed validation. The cursor stays on its record.
    Corrupt,
}

enum Outcome {
    Record(Record, u64),
    Clean,
    Partial,
    Corrupt { offset: u64, reason: CorruptReason },
}

/// Sequential reader of a log file, safe to run against a file another
/// process is still appending to.
pub struct Reader {
    file: Option<BufReader<File>>,
    path: PathBuf,
    /// Start of the next record to scan.
    offset: u64,
    /// False when the OS file position may differ from `offset`.
    synced: bool,
    state: ScanState,
    header: FileHeader,
}

impl Reader {
    pub fn open_for_scan(path: impl AsRef<Path>, options: &LogOptions) -> Result<Self, LogError> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LogError::NotFound(path)),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len < FILE_HEADER_SIZE as u64 {
            return Err(LogError::TruncatedHeader { len });
        }

        let mut file = BufReader::with_capacity(options.buffer_capacity, file);
        let mut raw = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = FileHeader::decode(&raw);
        if !header.is_recognized() {
            if options.strict_header {
                return Err(LogError::UnrecognizedHeader);
            }
            debug!(path = %path.display(), ?header, "unrecognized identification header, scanning anyway");
        }

        info!(path = %path.display(), len, "opened log for scan");
        Ok(Self {
            file: Some(file),
            path,
            offset: FILE_HEADER_SIZE as u64,
            synced: true,
            state: ScanState::Reading,
            header,
        })
    }

    /// Reads the next complete logical record.
    ///
    /// `Ok(None)` means no complete record is available, either because the
    /// log ended cleanly or because the writer has not finished the next one;
    /// [`Reader::state`] tells the two apart. A later call picks up whatever
    /// was appended in the meantime.
    pub fn scan_record(&mut self) -> Result<Option<Record>, LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        if !self.synced {
            file.seek(SeekFrom::Start(self.offset))?;
            self.synced = true;
        }

        let file_len = file.get_ref().metadata()?.len();
        self.state = ScanState::Reading;
        let outcome = {
            let mut scan = Scan {
                file: &mut *file,
                pos: self.offset,
                file_len,
            };
            scan.next_record()
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.synced = false;
                return Err(e.into());
            }
        };

        match outcome {
            Outcome::Record(record, end) => {
                self.offset = end;
                Ok(Some(record))
            }
            Outcome::Clean => {
                self.state = ScanState::EofClean;
                Ok(None)
            }
            Outcome::Partial => {
                trace!(offset = self.offset, file_len, "incomplete record at tail");
                self.state = ScanState::EofPartial;
                self.synced = false;
                Ok(None)
            }
            Outcome::Corrupt { offset, reason } => {
                warn!(path = %self.path.display(), offset, %reason, "corrupt chunk");
                self.state = ScanState::Corrupt;
                self.synced = false;
                Err(LogError::Corrupt { offset, reason })
            }
        }
    }

    /// Lazily yields record payloads until no complete record remains.
    pub fn scan_data(&mut self) -> ScanData<'_> {
        ScanData {
            reader: self,
            done: false,
        }
    }

    /// Moves the cursor to a record boundary, e.g. an offset returned by a
    /// writer. Offsets inside block padding are fine.
    pub fn seek(&mut self, offset: u64) -> Result<(), LogError> {
        if self.file.is_none() {
            return Err(LogError::Closed);
        }
        if offset < FILE_HEADER_SIZE as u64 {
            return Err(LogError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset {} is inside the identification header", offset),
            )));
        }
        self.offset = offset;
        self.synced = false;
        self.state = ScanState::Reading;
        Ok(())
    }

    /// Offset just past the last record returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(&mut self) -> Result<(), LogError> {
        self.file.take().ok_or(LogError::Closed)?;
        debug!(path = %self.path.display(), offset = self.offset, "closed log reader");
        Ok(())
    }
}

pub struct ScanData<'a> {
    reader: &'a mut Reader,
    done: bool,
}

impl Iterator for ScanData<'_> {
    type Item = Result<Vec<u8>, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.scan_record() {
            Ok(Some(record)) => Some(Ok(record.data)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ScanData<'_> {}

/// One pass over the chunks of a single record, starting at `pos`.
struct Scan<'a> {
    file: &'a mut BufReader<File>,
    pos: u64,
    file_len: u64,
}

impl Scan<'_> {
    fn available(&self) -> u64 {
        self.file_len.saturating_sub(self.pos)
    }

    fn next_record(&mut self) -> io::Result<Outcome> {
        let start = self.pos;
        let mut data = Vec::new();
        let mut in_record = false;

        loop {
            let available = self.available();
            if available == 0 && self.pos == start {
                return Ok(Outcome::Clean);
            }

            let remaining = chunk::block_remaining(self.pos);
            if remaining < HEADER_SIZE {
                // Zero padding up to the next block
                if available < remaining as u64 {
                    return Ok(Outcome::Partial);
                }
                self.file.seek_relative(remaining as i64)?;
                self.pos += remaining as u64;
                continue;
            }

            if available < HEADER_SIZE as u64 {
                return Ok(Outcome::Partial);
            }
            let chunk_offset = self.pos;
            let mut raw = [0u8; HEADER_SIZE];
            self.file.read_exact(&mut raw)?;
            self.pos += HEADER_SIZE as u64;
            let header = ChunkHeader::decode(&raw);

            let room = remaining - HEADER_SIZE;
            let len = header.length as usize;
            if len > room {
                return Ok(Outcome::Corrupt {
                    offset: chunk_offset,
                    reason: CorruptReason::LengthOverrun {
                        length: header.length,
                        available: room,
                    },
                });
            }
            if self.available() < len as u64 {
                return Ok(Outcome::Partial);
            }

            let at = data.len();
            data.resize(at + len, 0);
            self.file.read_exact(&mut data[at..])?;
            self.pos += len as u64;

            let checked = header.verify(&data[at..]).and_then(|_| header.chunk_type());
            let kind = match checked {
                Ok(kind) => kind,
                Err(reason) => {
                    return Ok(Outcome::Corrupt {
                        offset: chunk_offset,
                        reason,
                    })
                }
            };

            match (kind, in_record) {
                (ChunkType::Full, false) | (ChunkType::Last, true) => {
                    let record = Record {
                        kind: kind as u8,
                        data,
                    };
                    return Ok(Outcome::Record(record, self.pos));
                }
                (ChunkType::First, false) => in_record = true,
                (ChunkType::Middle, true) => {}
                (kind, in_record) => {
                    return Ok(Outcome::Corrupt {
                        offset: chunk_offset,
                        reason: CorruptReason::OutOfSequence {
                            kind: kind as u8,
                            in_record,
                        },
                    })
                }
            }
        }
    }
}
