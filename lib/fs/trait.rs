//! Generic trait for implementing filesystems.
//!
//! Note that this is a slightly cleaner interface than directly using fuser. The whole point of
//! this is to abstract away fuser-specific details.
//!
//! Only lookup, getattr, readdir, read and statfs carry real semantics. Everything else has a
//! default body that succeeds without doing anything, which is all a read-only filesystem with no
//! per-handle state needs.
use std::ffi::OsStr;

use async_trait::async_trait;
use bytes::Bytes;

use super::dirent::DirentBatch;
use super::{FileHandle, FsStats, INode, InodeAddr};

/// The operations a filesystem exposes to [`FuserAdapter`](super::fuser::FuserAdapter).
#[async_trait]
pub trait Fs: Send + Sync + 'static {
    /// Error reported by every fallible operation.
    type Error: std::error::Error + Send + 'static;

    /// Resolve `name` inside the directory `parent`.
    async fn lookup(&self, parent: InodeAddr, name: &OsStr) -> Result<INode, Self::Error>;

    /// Attributes of `ino`.
    async fn getattr(&self, ino: InodeAddr) -> Result<INode, Self::Error>;

    /// Encode the entries of `ino` that follow `cursor`, in at most `capacity` bytes.
    async fn readdir(
        &self,
        ino: InodeAddr,
        cursor: u64,
        capacity: usize,
    ) -> Result<DirentBatch, Self::Error>;

    /// Read up to `size` bytes at `offset` into a freshly allocated buffer.
    async fn read(&self, ino: InodeAddr, offset: u64, size: u32) -> Result<Bytes, Self::Error>;

    /// Read up to `size` bytes at `offset` into `dest`, which must be exactly `size` bytes long.
    ///
    /// Returns how many bytes at the front of `dest` were written.
    async fn read_into(
        &self,
        ino: InodeAddr,
        offset: u64,
        size: u32,
        dest: &mut [u8],
    ) -> Result<usize, Self::Error>;

    /// Get filesystem statistics.
    async fn statfs(&self) -> FsStats;

    /// Open a directory. Every inode has exactly one logical handle: its own address.
    async fn opendir(&self, ino: InodeAddr) -> Result<FileHandle, Self::Error> {
        Ok(ino)
    }

    /// Open a file for reading. Every inode has exactly one logical handle: its own address.
    async fn open(&self, ino: InodeAddr) -> Result<FileHandle, Self::Error> {
        Ok(ino)
    }

    /// Called when the kernel closes a directory handle.
    async fn releasedir(&self, _ino: InodeAddr, _fh: FileHandle) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when the kernel closes a file handle.
    async fn release(&self, _ino: InodeAddr, _fh: FileHandle) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on every close of a file descriptor.
    async fn flush(&self, _ino: InodeAddr, _fh: FileHandle) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Value of the extended attribute `name`. Nothing has extended attributes.
    async fn getxattr(&self, _ino: InodeAddr, _name: &OsStr) -> Result<Bytes, Self::Error> {
        Ok(Bytes::new())
    }

    /// NUL-separated names of the extended attributes of `ino`. Always empty.
    async fn listxattr(&self, _ino: InodeAddr) -> Result<Bytes, Self::Error> {
        Ok(Bytes::new())
    }

    /// Called when the kernel is done with an inode.
    async fn forget(&self, _ino: InodeAddr, _nlookups: u64) {}
}
