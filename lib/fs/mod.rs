//! Core vocabulary of the synthetic filesystem.
/// Immutable inode table and directory listings.
pub mod catalog;
/// Resumable, capacity-bounded directory enumeration.
pub mod dirent;
pub mod error;
/// FUSE adapter: maps kernel requests onto [`r#trait::Fs`].
pub mod fuser;
/// Offset clamping and wraparound reads against the served file.
pub mod read;
/// The random backing buffer replayed by every read.
pub mod source;
/// The concrete filesystem assembled from the pieces above.
pub mod synth;
/// Capability interface exposing every filesystem operation.
pub mod r#trait;

pub use error::FsError;

use std::time::SystemTime;

use bitflags::bitflags;

/// Type representing an inode identifier.
pub type InodeAddr = u64;

/// Type representing a file handle.
pub type FileHandle = u64;

/// The root directory.
pub const ROOT_INODE: InodeAddr = 1;

/// The single served file.
pub const FILE_INODE: InodeAddr = 2;

/// Name of the served file unless configured otherwise.
pub const DEFAULT_FILE_NAME: &str = "test";

/// Declared size of the served file unless configured otherwise (1 TiB).
pub const DEFAULT_FILE_SIZE: u64 = 1 << 40;

/// Length of the backing buffer unless configured otherwise (1 GiB).
pub const DEFAULT_BUFFER_LEN: usize = 1 << 30;

bitflags! {
    /// Permission bits for an inode, similar to Unix file permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodePerms: u16 {
        /// Other: execute permission.
        const OTHER_EXECUTE = 1 << 0;
        /// Other: write permission.
        const OTHER_WRITE   = 1 << 1;
        /// Other: read permission.
        const OTHER_READ    = 1 << 2;

        /// Group: execute permission.
        const GROUP_EXECUTE = 1 << 3;
        /// Group: write permission.
        const GROUP_WRITE   = 1 << 4;
        /// Group: read permission.
        const GROUP_READ    = 1 << 5;

        /// Owner: execute permission.
        const OWNER_EXECUTE = 1 << 6;
        /// Owner: write permission.
        const OWNER_WRITE   = 1 << 7;
        /// Owner: read permission.
        const OWNER_READ    = 1 << 8;

        /// Read for owner, group and other (`0o444`).
        const ALL_READ = Self::OWNER_READ.bits()
            | Self::GROUP_READ.bits()
            | Self::OTHER_READ.bits();
        /// Execute for owner, group and other (`0o111`).
        const ALL_EXECUTE = Self::OWNER_EXECUTE.bits()
            | Self::GROUP_EXECUTE.bits()
            | Self::OTHER_EXECUTE.bits();
    }
}

/// The type of an inode entry in the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum INodeType {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

impl INodeType {
    /// The `DT_*` value used for this type in directory entries.
    #[must_use]
    pub fn dirent_type(self) -> u32 {
        match self {
            Self::File => u32::from(libc::DT_REG),
            Self::Directory => u32::from(libc::DT_DIR),
        }
    }

    /// Inverse of [`Self::dirent_type`].
    #[must_use]
    pub fn from_dirent_type(dt: u32) -> Option<Self> {
        match u8::try_from(dt).ok()? {
            libc::DT_REG => Some(Self::File),
            libc::DT_DIR => Some(Self::Directory),
            _ => None,
        }
    }
}

/// Attributes of an inode.
///
/// Always handed out by value; nothing outside the catalog can observe or alter the stored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct INode {
    /// The address of this inode, which serves as its unique identifier.
    pub addr: InodeAddr,
    /// Whether this is the directory or the file.
    pub itype: INodeType,
    /// The permissions associated with this inode, represented as a bitfield.
    pub permissions: InodePerms,
    /// Number of hard links reported for this inode.
    pub nlink: u32,
    /// The user ID of the owner of this inode.
    pub uid: u32,
    /// The group ID of the owner of this inode.
    pub gid: u32,
    /// The declared size in bytes. Zero for directories.
    pub size: u64,
    /// The time this inode was created at.
    pub create_time: SystemTime,
    /// The time this inode was last modified at.
    pub last_modified_at: SystemTime,
}

impl INode {
    /// Check whether this inode is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.itype == INodeType::Directory
    }
}

/// Filesystem statistics returned by [`r#trait::Fs::statfs`].
///
/// Block-related sizes are in units of `block_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsStats {
    /// Filesystem block size (bytes).
    pub block_size: u32,
    /// Total number of data blocks.
    pub total_blocks: u64,
    /// Number of free blocks.
    pub free_blocks: u64,
    /// Number of blocks available to unprivileged users.
    pub available_blocks: u64,
    /// Total number of file nodes (inodes).
    pub total_inodes: u64,
    /// Number of free file nodes.
    pub free_inodes: u64,
    /// Maximum filename length (bytes).
    pub max_filename_length: u32,
}
