//! The chunk buffer: one chunk's payload between reading and writing it.
//!
//! Chunks no larger than the memory limit live in a single reusable `Vec`.
//! Larger chunks are staged in an anonymous temp file in [`IO_STEP`] pieces,
//! then rewound and streamed into the archive.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::error::SplitError;

/// Granularity of reads when a chunk is spilled to disk.
pub const IO_STEP: usize = 32 * 1024;

pub enum ChunkBuffer {
    Memory {
        data: Vec<u8>,
        len: usize,
    },
    Spill {
        file: File,
        scratch: Box<[u8]>,
        capacity: u64,
        len: u64,
    },
}

impl ChunkBuffer {
    /// Allocates a buffer for chunks of `capacity` bytes.
    pub fn new(capacity: u64, memory_limit: u64) -> Result<Self, SplitError> {
        if capacity <= memory_limit {
            if let Ok(size) = usize::try_from(capacity) {
                debug!(capacity, "allocating in-memory chunk buffer");
                return Ok(ChunkBuffer::Memory { data: vec![0; size], len: 0 });
            }
        }

        debug!(capacity, memory_limit, "chunk exceeds memory limit, spilling to temp file");
        let file = tempfile::tempfile().map_err(SplitError::Buffer)?;
        Ok(ChunkBuffer::Spill {
            file,
            scratch: vec![0; IO_STEP].into_boxed_slice(),
            capacity,
            len: 0,
        })
    }

    pub fn capacity(&self) -> u64 {
        match self {
            ChunkBuffer::Memory { data, .. } => data.len() as u64,
            ChunkBuffer::Spill { capacity, .. } => *capacity,
        }
    }

    /// Number of payload bytes from the last fill.
    pub fn len(&self) -> u64 {
        match self {
            ChunkBuffer::Memory { len, .. } => *len as u64,
            ChunkBuffer::Spill { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, ChunkBuffer::Spill { .. })
    }

    /// Replaces the payload with the next chunk read from `source`.
    ///
    /// Reads until the buffer is full or the source reports end-of-stream,
    /// and returns the number of bytes buffered. Zero means the source is
    /// exhausted.
    pub fn fill_from<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<u64, SplitError> {
        match self {
            ChunkBuffer::Memory { data, len } => {
                *len = 0;
                while *len < data.len() {
                    trace!(want = data.len() - *len, "reading from source");
                    match read_some(source, &mut data[*len..])? {
                        0 => break,
                        n => *len += n,
                    }
                }
                Ok(*len as u64)
            }
            ChunkBuffer::Spill { file, scratch, capacity, len } => {
                *len = 0;
                file.seek(SeekFrom::Start(0)).map_err(SplitError::Buffer)?;
                while *len < *capacity {
                    let want = usize::try_from(*capacity - *len).map_or(scratch.len(), |left| left.min(scratch.len()));
                    trace!(want, "reading from source");
                    let n = read_some(source, &mut scratch[..want])?;
                    if n == 0 {
                        break;
                    }
                    file.write_all(&scratch[..n]).map_err(SplitError::Buffer)?;
                    *len += n as u64;
                }
                Ok(*len)
            }
        }
    }

    /// A reader over exactly the bytes of the last fill.
    pub fn payload(&mut self) -> Result<Box<dyn Read + '_>, SplitError> {
        match self {
            ChunkBuffer::Memory { data, len } => Ok(Box::new(&data[..*len])),
            ChunkBuffer::Spill { file, len, .. } => {
                file.flush().map_err(SplitError::Buffer)?;
                file.seek(SeekFrom::Start(0)).map_err(SplitError::Buffer)?;
                Ok(Box::new(Read::take(file, *len)))
            }
        }
    }
}

/// One read from the source. `Interrupted` is retried; `Ok(0)` is end-of-stream.
fn read_some<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> Result<usize, SplitError> {
    loop {
        match source.read(buf) {
            Ok(n) => {
                trace!(read = n, "read from source");
                return Ok(n);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SplitError::SourceRead(e)),
        }
    }
}

impl std::fmt::Debug for ChunkBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("spilled", &self.is_spilled())
            .finish()
    }
}
