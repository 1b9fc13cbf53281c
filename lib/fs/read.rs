//! Reads against the served file.
//!
//! The file declares a size far larger than the buffer backing it. Byte `p` of the file is byte
//! `p mod L` of the buffer, so a read is a short sequence of contiguous copies out of the buffer,
//! restarting at its beginning every time the range crosses its end.
//!
//! Output is delivered in one of two modes, selected solely by whether the caller passes a
//! destination:
//!
//! - **caller buffer**: the destination must be exactly as long as the requested length. Bytes
//!   land in its prefix and no allocation happens.
//! - **engine buffer**: a fresh buffer of exactly the produced length is allocated and handed
//!   over to the caller.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::error::BuildError;
use super::source::SourceBuffer;
use super::FsError;

/// A span of bytes requested from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadRange {
    /// First byte of the span.
    pub offset: u64,
    /// Number of bytes in the span.
    pub length: usize,
}

impl ReadRange {
    /// A span of `length` bytes starting at `offset`.
    #[must_use]
    pub const fn new(offset: u64, length: usize) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the span, saturating at `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length as u64)
    }

    /// Restrict the span to a file of `file_size` bytes.
    ///
    /// An offset equal to the size is the end of the stream and clamps to an empty span. An offset
    /// beyond it is an error.
    pub fn clamp(self, file_size: u64) -> Result<Self, FsError> {
        if self.offset > file_size {
            return Err(FsError::EndOfFile {
                offset: self.offset,
                size: file_size,
            });
        }

        let end = self.end().min(file_size);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the clamped length never exceeds the requested usize length"
        )]
        let length = (end - self.offset) as usize;
        Ok(Self {
            offset: self.offset,
            length,
        })
    }
}

/// Bytes produced by [`ReadEngine::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadData<'d> {
    /// The filled prefix of the destination the caller supplied.
    Caller(&'d [u8]),
    /// A buffer allocated by the engine, now owned by the caller.
    Engine(Bytes),
}

impl ReadData<'_> {
    /// The produced bytes, whichever buffer holds them.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Caller(slice) => slice,
            Self::Engine(bytes) => bytes,
        }
    }

    /// Take ownership of the produced bytes. Free for engine buffers, a copy for caller buffers.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Caller(slice) => Bytes::copy_from_slice(slice),
            Self::Engine(bytes) => bytes,
        }
    }
}

/// Result of a successful [`ReadEngine::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutput<'d> {
    /// How many bytes were produced. Zero exactly when reading at the end of the file.
    pub produced: usize,
    /// Where the bytes are.
    pub data: ReadData<'d>,
}

/// Serves reads of one file of declared size `file_size` from a [`SourceBuffer`].
#[derive(Debug, Clone)]
pub struct ReadEngine {
    source: SourceBuffer,
    file_size: u64,
}

impl ReadEngine {
    /// Serve a file of `file_size` bytes from `source`, which must not be longer than the file.
    pub fn new(source: SourceBuffer, file_size: u64) -> Result<Self, BuildError> {
        if source.len() as u64 > file_size {
            return Err(BuildError::SourceLargerThanFile {
                buffer_len: source.len(),
                file_size,
            });
        }
        Ok(Self { source, file_size })
    }

    /// Declared size of the served file.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The buffer reads are answered from.
    #[must_use]
    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    /// Read up to `requested` bytes starting at `offset`.
    ///
    /// With `Some(destination)` the bytes are written into the destination, which must be exactly
    /// `requested` bytes long, and the returned data borrows it. With `None` the engine allocates
    /// the output. Identical arguments always produce identical bytes.
    ///
    /// Only `None` selects the engine buffer. An empty destination is still a caller buffer, so
    /// `Some(&mut [])` with a non-zero `requested` fails with [`FsError::ProtocolMisuse`] rather
    /// than falling back to allocation.
    pub fn read<'d>(
        &self,
        offset: u64,
        requested: usize,
        destination: Option<&'d mut [u8]>,
    ) -> Result<ReadOutput<'d>, FsError> {
        if let Some(dest) = &destination
            && dest.len() != requested
        {
            return Err(FsError::ProtocolMisuse {
                expected: requested,
                actual: dest.len(),
            });
        }

        let range = ReadRange::new(offset, requested).clamp(self.file_size)?;
        trace!(offset, requested, produced = range.length, "serving read");

        let data = match destination {
            Some(dest) => {
                self.fill(range, &mut dest[..range.length]);
                let dest: &'d [u8] = dest;
                ReadData::Caller(&dest[..range.length])
            }
            None => {
                let mut out = BytesMut::with_capacity(range.length);
                for run in self.source.runs(range.offset, range.length) {
                    out.extend_from_slice(run);
                }
                ReadData::Engine(out.freeze())
            }
        };

        Ok(ReadOutput {
            produced: range.length,
            data,
        })
    }

    fn fill(&self, range: ReadRange, dest: &mut [u8]) {
        debug_assert_eq!(dest.len(), range.length, "destination must match the clamped range");
        let mut written = 0;
        for run in self.source.runs(range.offset, range.length) {
            dest[written..written + run.len()].copy_from_slice(run);
            written += run.len();
        }
    }
}
