//! Errors surfaced by filesystem operations.
use thiserror::Error;

use super::InodeAddr;

/// Every failure an operation on the synthetic filesystem can report.
///
/// Operations are pure functions of immutable state, so none of these are transient and retrying
/// the same request always yields the same result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// Unknown inode, or no child with the requested name.
    #[error("no such file or directory")]
    NotFound,

    /// A listing was requested on something that is not a directory.
    #[error("inode {0} is not a directory")]
    NotADirectory(InodeAddr),

    /// File data was requested from a directory.
    #[error("inode {0} is a directory")]
    IsADirectory(InodeAddr),

    /// The enumeration cursor lies past the end of the listing.
    #[error("cursor {cursor} is past the end of a listing with {entries} entries")]
    InvalidCursor {
        /// The cursor the caller asked to resume after.
        cursor: u64,
        /// How many entries the listing has.
        entries: u64,
    },

    /// The read offset lies strictly past the end of the file.
    #[error("offset {offset} is past the end of a {size} byte file")]
    EndOfFile {
        /// The offset the caller asked to read from.
        offset: u64,
        /// The declared file size.
        size: u64,
    },

    /// The destination buffer does not match the requested length.
    #[error("destination holds {actual} bytes but {expected} were requested")]
    ProtocolMisuse {
        /// The requested read length.
        expected: usize,
        /// The length of the supplied destination.
        actual: usize,
    },
}

impl From<FsError> for i32 {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::InvalidCursor { .. } | FsError::EndOfFile { .. } => libc::EINVAL,
            FsError::ProtocolMisuse { .. } => libc::EIO,
        }
    }
}

/// Reasons a filesystem cannot be assembled from the given parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The backing buffer would hold no bytes.
    #[error("the source buffer must not be empty")]
    EmptySource,

    /// The backing buffer is longer than the file it backs.
    #[error("the source buffer ({buffer_len} bytes) is larger than the file ({file_size} bytes)")]
    SourceLargerThanFile {
        /// Length of the backing buffer.
        buffer_len: usize,
        /// Declared size of the file.
        file_size: u64,
    },

    /// The file name cannot appear in a directory.
    #[error("invalid file name {0:?}: {1}")]
    InvalidFileName(String, &'static str),
}
