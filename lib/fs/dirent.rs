//! Directory enumeration in bounded, resumable batches.
//!
//! Entries are encoded with the kernel's `fuse_dirent` layout, so a batch's capacity means exactly
//! what the kernel means by the size of a readdir reply buffer:
//!
//! ```text
//! u64 ino | u64 off | u32 namelen | u32 type | name | zero padding to a multiple of 8
//! ```
//!
//! `off` carries the entry's cursor, the value the caller passes back to resume after it.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt as _;

use bytes::{BufMut as _, Bytes, BytesMut};
use tracing::trace;

use super::catalog::{DirEntry, InodeCatalog};
use super::{FsError, INodeType, InodeAddr};

/// Size of the fixed part of an encoded entry.
pub const DIRENT_HEADER_LEN: usize = 24;

const DIRENT_ALIGN: usize = 8;

/// Encoded size of an entry whose name is `name_len` bytes long.
#[must_use]
pub const fn dirent_len(name_len: usize) -> usize {
    (DIRENT_HEADER_LEN + name_len).next_multiple_of(DIRENT_ALIGN)
}

/// Encoded directory entries produced by one [`DirectoryEnumerator::enumerate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirentBatch {
    bytes: Bytes,
    entries: usize,
    last_cursor: Option<u64>,
}

impl DirentBatch {
    /// The encoded entries.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of encoded bytes. Never exceeds the capacity the batch was built with.
    #[must_use]
    pub fn bytes_produced(&self) -> usize {
        self.bytes.len()
    }

    /// Number of entries in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Whether the batch holds no entries. At the end of a listing this is the normal outcome.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Cursor of the last entry, i.e. the value to resume from. `None` for an empty batch.
    #[must_use]
    pub fn last_cursor(&self) -> Option<u64> {
        self.last_cursor
    }

    /// Encode the entries of `listing` ranked after `cursor`, up to `capacity` bytes.
    ///
    /// `listing` must be in rank order, the entry at index `i` carrying cursor `i + 1`.
    pub fn from_listing(
        listing: &[DirEntry],
        cursor: u64,
        capacity: usize,
    ) -> Result<Self, FsError> {
        let entries = listing.len() as u64;
        if cursor > entries {
            return Err(FsError::InvalidCursor { cursor, entries });
        }

        #[expect(
            clippy::cast_possible_truncation,
            reason = "cursor is bounded by the listing length, which is a usize"
        )]
        let remaining = &listing[cursor as usize..];

        let mut buf = BytesMut::new();
        let mut batch = Self::default();
        for entry in remaining {
            if buf.len() + dirent_len(entry.name.len()) > capacity {
                break;
            }
            encode_into(&mut buf, entry);
            batch.entries += 1;
            batch.last_cursor = Some(entry.cursor);
        }
        batch.bytes = buf.freeze();
        Ok(batch)
    }

    /// Decode the entries in order.
    #[must_use]
    pub fn iter(&self) -> DirentIter<'_> {
        DirentIter { buf: &self.bytes }
    }
}

impl<'a> IntoIterator for &'a DirentBatch {
    type Item = DecodedDirent<'a>;
    type IntoIter = DirentIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A view of one entry inside a [`DirentBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedDirent<'a> {
    /// The child inode.
    pub ino: InodeAddr,
    /// 1-based rank of the entry in its parent's listing.
    pub cursor: u64,
    /// The type of the child.
    pub itype: INodeType,
    /// The entry's name.
    pub name: &'a OsStr,
}

/// Iterator returned by [`DirentBatch::iter`].
#[derive(Debug, Clone)]
pub struct DirentIter<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for DirentIter<'a> {
    type Item = DecodedDirent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.buf.get(..DIRENT_HEADER_LEN)?;
        let ino = u64::from_ne_bytes(header[0..8].try_into().ok()?);
        let cursor = u64::from_ne_bytes(header[8..16].try_into().ok()?);
        let name_len = u32::from_ne_bytes(header[16..20].try_into().ok()?) as usize;
        let itype = INodeType::from_dirent_type(u32::from_ne_bytes(header[20..24].try_into().ok()?))?;
        let name = self
            .buf
            .get(DIRENT_HEADER_LEN..DIRENT_HEADER_LEN + name_len)?;

        self.buf = self.buf.get(dirent_len(name_len)..).unwrap_or_default();
        Some(DecodedDirent {
            ino,
            cursor,
            itype,
            name: OsStr::from_bytes(name),
        })
    }
}

/// Turns a directory's listing plus a resumption cursor into a [`DirentBatch`].
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEnumerator<'c> {
    catalog: &'c InodeCatalog,
}

impl<'c> DirectoryEnumerator<'c> {
    /// Enumerate directories of `catalog`.
    #[must_use]
    pub fn new(catalog: &'c InodeCatalog) -> Self {
        Self { catalog }
    }

    /// Encode the entries of `parent` ranked after `cursor`, up to `capacity` bytes.
    ///
    /// A cursor equal to the number of entries is the end of the listing and yields an empty
    /// batch. A larger cursor is an error. Entries are never split: encoding stops before the
    /// first entry that would not fit.
    pub fn enumerate(
        &self,
        parent: InodeAddr,
        cursor: u64,
        capacity: usize,
    ) -> Result<DirentBatch, FsError> {
        let listing = self.catalog.list_children(parent)?;
        let batch = DirentBatch::from_listing(listing, cursor, capacity)?;
        trace!(
            parent,
            cursor,
            capacity,
            entries = batch.entries,
            bytes = batch.bytes.len(),
            "encoded directory batch"
        );
        Ok(batch)
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "entry names are bounded by NAME_MAX"
)]
fn encode_into(buf: &mut BytesMut, entry: &DirEntry) {
    let name = entry.name.as_bytes();
    let len = dirent_len(name.len());
    buf.reserve(len);
    buf.put_u64_ne(entry.ino);
    buf.put_u64_ne(entry.cursor);
    buf.put_u32_ne(name.len() as u32);
    buf.put_u32_ne(entry.itype.dirent_type());
    buf.put_slice(name);
    buf.put_bytes(0, len - DIRENT_HEADER_LEN - name.len());
}
