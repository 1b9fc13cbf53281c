//! The fixed namespace: one root directory holding one file.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::time::SystemTime;

use tracing::warn;

use super::{FILE_INODE, FsError, INode, INodeType, InodeAddr, InodePerms, ROOT_INODE};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    /// 1-based rank of this entry within its parent's listing.
    pub cursor: u64,
    /// The child inode.
    pub ino: InodeAddr,
    /// The name of this entry within its parent directory.
    pub name: OsString,
    /// The type of the child.
    pub itype: INodeType,
}

/// The inode table and parent to children listings.
///
/// Built once before serving and never mutated afterwards, so it can be shared between any number
/// of concurrent readers without synchronization.
#[derive(Debug, Clone)]
pub struct InodeCatalog {
    inodes: HashMap<InodeAddr, INode>,
    children: HashMap<InodeAddr, Vec<DirEntry>>,
}

impl InodeCatalog {
    /// Build the namespace: [`ROOT_INODE`] containing `file_name` as [`FILE_INODE`].
    ///
    /// `file_name` is taken verbatim; validating it is the caller's job.
    #[must_use]
    pub fn new(file_name: impl Into<OsString>, file_size: u64, uid: u32, gid: u32) -> Self {
        let now = SystemTime::now();
        let root = INode {
            addr: ROOT_INODE,
            itype: INodeType::Directory,
            permissions: InodePerms::ALL_READ | InodePerms::ALL_EXECUTE,
            nlink: 1,
            uid,
            gid,
            size: 0,
            create_time: now,
            last_modified_at: now,
        };
        let file = INode {
            addr: FILE_INODE,
            itype: INodeType::File,
            permissions: InodePerms::ALL_READ,
            nlink: 1,
            uid,
            gid,
            size: file_size,
            create_time: now,
            last_modified_at: now,
        };

        let inodes = HashMap::from([(ROOT_INODE, root), (FILE_INODE, file)]);
        let children = HashMap::from([(
            ROOT_INODE,
            vec![DirEntry {
                cursor: 1,
                ino: FILE_INODE,
                name: file_name.into(),
                itype: INodeType::File,
            }],
        )]);

        Self { inodes, children }
    }

    /// Resolve `name` inside `parent`.
    ///
    /// Names are compared byte for byte, without any case folding or normalization.
    pub fn lookup_child(&self, parent: InodeAddr, name: &OsStr) -> Result<INode, FsError> {
        let entry = self
            .list_children(parent)
            .map_err(|e| match e {
                FsError::NotADirectory(_) => FsError::NotFound,
                other => other,
            })?
            .iter()
            .find(|entry| entry.name.as_os_str() == name)
            .ok_or(FsError::NotFound)?;

        self.get_attributes(entry.ino)
    }

    /// Attributes of `ino`.
    pub fn get_attributes(&self, ino: InodeAddr) -> Result<INode, FsError> {
        self.inodes.get(&ino).copied().ok_or_else(|| {
            warn!(ino, "Attributes requested for unknown inode.");
            FsError::NotFound
        })
    }

    /// The ordered listing of `parent`. The entry at index `i` has cursor `i + 1`.
    pub fn list_children(&self, parent: InodeAddr) -> Result<&[DirEntry], FsError> {
        let inode = self.get_attributes(parent)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory(parent));
        }

        Ok(self.children.get(&parent).map_or(&[], Vec::as_slice))
    }

    /// Number of inodes in the namespace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    /// Whether the namespace holds no inodes. Never true for a catalog built by [`Self::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }
}
