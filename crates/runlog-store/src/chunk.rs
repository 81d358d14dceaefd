//! Physical layout of a log file.
//!
//! The file is cut into 32 KiB blocks. Records are written as chunks, each a
//! 7-byte header followed by its data:
//!
//! ```text
//! +----------------+--------------+----------+-----------------+
//! | checksum (u32) | length (u16) | type (u8)| data (length B) |
//! +----------------+--------------+----------+-----------------+
//! ```
//!
//! Integers are little-endian. The checksum is CRC-32C over the type byte
//! followed by the data. A chunk never crosses a block boundary; when fewer
//! than 7 bytes remain in a block they are zero-filled and skipped.
//!
//! The first 7 bytes of block 0 hold the identification header, so block 0
//! has 32761 bytes for chunks.

use bytes::{Buf, BufMut};
use runlog_common::CorruptReason;

pub const BLOCK_SIZE: usize = 4096 * 8;
pub const HEADER_SIZE: usize = 7;
pub const FILE_HEADER_SIZE: usize = 7;

/// Largest data length a single chunk can carry (an empty block minus its header).
pub const MAX_CHUNK_DATA: usize = BLOCK_SIZE - HEADER_SIZE;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Zero = 0,
    Full = 1,
    First = 2,
    Middle = 3,
    Last = 4,
}

impl TryFrom<u8> for ChunkType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChunkType::Zero),
            1 => Ok(ChunkType::Full),
            2 => Ok(ChunkType::First),
            3 => Ok(ChunkType::Middle),
            4 => Ok(ChunkType::Last),
            other => Err(other),
        }
    }
}

/// Bytes left in the block containing `offset`.
pub fn block_remaining(offset: u64) -> usize {
    BLOCK_SIZE - (offset % BLOCK_SIZE as u64) as usize
}

pub fn checksum(kind: u8, data: &[u8]) -> u32 {
    crc32c::crc32c_append(crc32c::crc32c(&[kind]), data)
}

/// What the writer emits next for a pending payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Zero-fill the rest of the block; too small for a header.
    Pad(usize),
    Chunk { kind: ChunkType, len: usize },
}

/// Decides the next physical step for a payload with `bytes_left` bytes still
/// to write, given `block_remaining` bytes left in the current block.
///
/// A block with exactly 7 bytes left still gets a chunk: a zero-length
/// `FIRST` or `MIDDLE` when the payload is not empty.
pub fn split(block_remaining: usize, bytes_left: usize, is_first: bool) -> Step {
    if block_remaining < HEADER_SIZE {
        return Step::Pad(block_remaining);
    }

    let len = (block_remaining - HEADER_SIZE).min(bytes_left);
    let finishes = len == bytes_left;
    let kind = match (is_first, finishes) {
        (true, true) => ChunkType::Full,
        (true, false) => ChunkType::First,
        (false, true) => ChunkType::Last,
        (false, false) => ChunkType::Middle,
    };
    Step::Chunk { kind, len }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub checksum: u32,
    pub length: u16,
    /// Raw type byte; may not be a valid [`ChunkType`] when read from disk.
    pub kind: u8,
}

impl ChunkHeader {
    /// Builds the header for `data`. `data` must fit in one block.
    pub fn new(kind: ChunkType, data: &[u8]) -> Self {
        debug_assert!(data.len() <= MAX_CHUNK_DATA);
        Self {
            checksum: checksum(kind as u8, data),
            length: data.len() as u16,
            kind: kind as u8,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        let mut buf = &mut raw[..];
        buf.put_u32_le(self.checksum);
        buf.put_u16_le(self.length);
        buf.put_u8(self.kind);
        raw
    }

    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        Self {
            checksum: buf.get_u32_le(),
            length: buf.get_u16_le(),
            kind: buf.get_u8(),
        }
    }

    pub fn chunk_type(&self) -> Result<ChunkType, CorruptReason> {
        ChunkType::try_from(self.kind).map_err(CorruptReason::UnknownType)
    }

    /// Checks the stored checksum against `data`.
    pub fn verify(&self, data: &[u8]) -> Result<(), CorruptReason> {
        let actual = checksum(self.kind, data);
        if actual != self.checksum {
            return Err(CorruptReason::ChecksumMismatch {
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }
}

/// Appends one encoded chunk (header then data) to `out`.
pub fn encode_chunk(kind: ChunkType, data: &[u8], out: &mut impl BufMut) {
    out.put_slice(&ChunkHeader::new(kind, data).encode());
    out.put_slice(data);
}

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedChunk<'a> {
    pub kind: u8,
    pub length: u16,
    pub checksum_ok: bool,
    pub data: &'a [u8],
}

/// Inverse of [`encode_chunk`]. `data` must hold the declared length.
pub fn decode_chunk<'a>(raw: &[u8; HEADER_SIZE], data: &'a [u8]) -> DecodedChunk<'a> {
    let header = ChunkHeader::decode(raw);
    let data = &data[..header.length as usize];
    DecodedChunk {
        kind: header.kind,
        length: header.length,
        checksum_ok: header.verify(data).is_ok(),
        data,
    }
}

/// The 7 bytes at the start of every log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub ident: [u8; 4],
    pub magic: u16,
    pub version: u8,
}

impl FileHeader {
    pub const IDENT: [u8; 4] = *b":RLG";
    pub const MAGIC: u16 = 0xBEE1;
    pub const VERSION: u8 = 0;

    pub fn current() -> Self {
        Self {
            ident: Self::IDENT,
            magic: Self::MAGIC,
            version: Self::VERSION,
        }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut raw = [0u8; FILE_HEADER_SIZE];
        let mut buf = &mut raw[..];
        buf.put_slice(&self.ident);
        buf.put_u16_le(self.magic);
        buf.put_u8(self.version);
        raw
    }

    pub fn decode(raw: &[u8; FILE_HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        let mut ident = [0u8; 4];
        buf.copy_to_slice(&mut ident);
        Self {
            ident,
            magic: buf.get_u16_le(),
            version: buf.get_u8(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        *self == Self::current()
    }
}
