//! The backing buffer every read of the served file is answered from.
//!
//! The content is random so that a benchmark cannot be flattered by compression or by a single
//! repeated byte value. It carries no meaning beyond that.

use std::iter::FusedIterator;

use bytes::Bytes;
use rand::{RngCore as _, SeedableRng as _, rngs::StdRng};
use tracing::{info, info_span};

/// An immutable byte sequence of fixed, non-zero length.
///
/// Cloning is cheap: clones share the same allocation.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    bytes: Bytes,
}

impl SourceBuffer {
    /// Fill a new buffer of `len` bytes from system entropy.
    ///
    /// Returns `None` if `len` is zero.
    #[must_use]
    pub fn random(len: usize) -> Option<Self> {
        Self::generate(len, StdRng::from_entropy())
    }

    /// Fill a new buffer of `len` bytes from a seeded generator, so the content is reproducible.
    ///
    /// Returns `None` if `len` is zero.
    #[must_use]
    pub fn seeded(len: usize, seed: u64) -> Option<Self> {
        Self::generate(len, StdRng::seed_from_u64(seed))
    }

    /// Wrap existing bytes. Returns `None` if `bytes` is empty.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        (!bytes.is_empty()).then_some(Self { bytes })
    }

    fn generate(len: usize, mut rng: StdRng) -> Option<Self> {
        if len == 0 {
            return None;
        }

        let _span = info_span!("SourceBuffer::generate", len).entered();
        let mut buf = vec![0u8; len];
        rng.fill_bytes(&mut buf);
        info!(len, "Generated source buffer.");
        Some(Self {
            bytes: Bytes::from(buf),
        })
    }

    /// Length of the buffer in bytes. Never zero.
    #[must_use]
    #[expect(clippy::len_without_is_empty, reason = "a source buffer is never empty")]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The raw content.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Position inside the buffer that logical byte `position` of the served file maps to.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the remainder is strictly less than the buffer length, which is a usize"
    )]
    pub fn wrap(&self, position: u64) -> usize {
        (position % self.bytes.len() as u64) as usize
    }

    /// Contiguous runs of the buffer covering `len` logical bytes starting at `position`.
    ///
    /// The first run starts at `position mod L` and stops at the end of the buffer; every
    /// following run starts over at index zero. Concatenating the runs yields exactly `len`
    /// bytes, however many times the range wraps.
    #[must_use]
    pub fn runs(&self, position: u64, len: usize) -> Runs<'_> {
        Runs {
            buf: &self.bytes,
            cursor: self.wrap(position),
            remaining: len,
        }
    }
}

/// Iterator returned by [`SourceBuffer::runs`].
#[derive(Debug, Clone)]
pub struct Runs<'a> {
    buf: &'a [u8],
    cursor: usize,
    remaining: usize,
}

impl<'a> Iterator for Runs<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let take = self.remaining.min(self.buf.len() - self.cursor);
        let run = &self.buf[self.cursor..self.cursor + take];
        self.remaining -= take;
        self.cursor = 0;
        Some(run)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }
        let first = self.remaining.min(self.buf.len() - self.cursor);
        let rest = (self.remaining - first).div_ceil(self.buf.len());
        (1 + rest, Some(1 + rest))
    }
}

impl ExactSizeIterator for Runs<'_> {}

impl FusedIterator for Runs<'_> {}
