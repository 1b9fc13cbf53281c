//! FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`Fs`].
//!
//! Each request is handed to its own task on a tokio runtime, so requests are served concurrently
//! and in no particular order relative to each other.
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, instrument};

use super::r#trait::Fs;
use super::{INode, INodeType};

/// Size of the directory batch requested from [`Fs::readdir`]. The kernel never asks for more
/// than a page of entries at a time.
const READDIR_CAPACITY: usize = 4096;

const BLOCK_SIZE: u32 = 4096;

/// Convert an `INode` to the fuser-specific `FileAttr`.
fn inode_to_fuser_attr(inode: &INode) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: inode.addr,
        size: inode.size,
        blocks: inode.size.div_ceil(512),
        atime: inode.last_modified_at,
        mtime: inode.last_modified_at,
        ctime: inode.last_modified_at,
        crtime: inode.create_time,
        kind: inode_type_to_fuser(inode.itype),
        perm: inode.permissions.bits(),
        nlink: inode.nlink,
        uid: inode.uid,
        gid: inode.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn inode_type_to_fuser(itype: INodeType) -> fuser::FileType {
    match itype {
        INodeType::Directory => fuser::FileType::Directory,
        INodeType::File => fuser::FileType::RegularFile,
    }
}

/// Answer an xattr request: a zero `size` asks for the length only.
fn reply_xattr(reply: fuser::ReplyXattr, size: u32, data: &[u8]) {
    let Ok(len) = u32::try_from(data.len()) else {
        reply.error(libc::ERANGE);
        return;
    };
    if size == 0 {
        reply.size(len);
    } else if len > size {
        reply.error(libc::ERANGE);
    } else {
        reply.data(data);
    }
}

/// Bridges an [`Fs`] to the [`fuser::Filesystem`] trait.
pub struct FuserAdapter<F: Fs>
where
    F::Error: Into<i32>,
{
    fs: Arc<F>,
    runtime: tokio::runtime::Handle,
    ttl: Duration,
}

impl<F: Fs> FuserAdapter<F>
where
    F::Error: Into<i32>,
{
    /// Serve `fs`, running every request on `runtime`.
    ///
    /// `ttl` is how long the kernel may cache attributes and entries. Nothing ever changes, so
    /// this can be long.
    pub fn new(fs: Arc<F>, runtime: tokio::runtime::Handle, ttl: Duration) -> Self {
        Self { fs, runtime, ttl }
    }
}

impl<F: Fs> fuser::Filesystem for FuserAdapter<F>
where
    F::Error: Into<i32>,
{
    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        let fs = Arc::clone(&self.fs);
        let name = name.to_owned();
        let ttl = self.ttl;
        self.runtime.spawn(async move {
            match fs.lookup(parent, &name).await {
                Ok(inode) => {
                    let f_attr = inode_to_fuser_attr(&inode);
                    debug!(?f_attr, "replying...");
                    reply.entry(&ttl, &f_attr, 0);
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::forget", skip(self, _req))]
    fn forget(&mut self, _req: &fuser::Request<'_>, ino: u64, nlookup: u64) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            fs.forget(ino, nlookup).await;
        });
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        let fs = Arc::clone(&self.fs);
        let ttl = self.ttl;
        self.runtime.spawn(async move {
            match fs.getattr(ino).await {
                Ok(inode) => {
                    let attr = inode_to_fuser_attr(&inode);
                    debug!(?attr, "replying...");
                    reply.attr(&ttl, &attr);
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, _flags, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.open(ino).await {
                Ok(fh) => {
                    debug!(handle = fh, "replying...");
                    reply.opened(fh, 0);
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _fh, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.read(ino, offset.cast_unsigned(), size).await {
                Ok(data) => {
                    debug!(read_bytes = data.len(), "replying...");
                    reply.data(&data);
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::flush", skip(self, _req, _lock_owner, reply))]
    fn flush(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.flush(ino, fh).await {
                Ok(()) => reply.ok(),
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.release(ino, fh).await {
                Ok(()) => {
                    debug!("replying ok");
                    reply.ok();
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::opendir", skip(self, _req, _flags, reply))]
    fn opendir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _flags: i32,
        reply: fuser::ReplyOpen,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.opendir(ino).await {
                Ok(fh) => {
                    debug!(handle = fh, "replying...");
                    reply.opened(fh, 0);
                }
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, _fh, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let fs = Arc::clone(&self.fs);
        // A negative offset becomes a huge cursor, which the filesystem rejects.
        let cursor = offset.cast_unsigned();
        self.runtime.spawn(async move {
            let batch = match fs.readdir(ino, cursor, READDIR_CAPACITY).await {
                Ok(batch) => batch,
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                    return;
                }
            };

            for entry in &batch {
                let Ok(next_offset) = i64::try_from(entry.cursor) else {
                    error!("Directory entry cursor {} too large for fuser", entry.cursor);
                    reply.error(libc::EIO);
                    return;
                };

                debug!(?entry, "adding entry to reply...");
                if reply.add(
                    entry.ino,
                    next_offset,
                    inode_type_to_fuser(entry.itype),
                    entry.name,
                ) {
                    debug!("buffer full for now, stopping readdir");
                    break;
                }
            }

            debug!("finalizing reply...");
            reply.ok();
        });
    }

    #[instrument(name = "FuserAdapter::releasedir", skip(self, _req, _flags, reply))]
    fn releasedir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.releasedir(ino, fh).await {
                Ok(()) => reply.ok(),
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::statfs", skip(self, _req, _ino, reply))]
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            let stats = fs.statfs().await;
            debug!(?stats, "replying...");
            reply.statfs(
                stats.total_blocks,
                stats.free_blocks,
                stats.available_blocks,
                stats.total_inodes,
                stats.free_inodes,
                stats.block_size,
                stats.max_filename_length,
                0,
            );
        });
    }

    #[instrument(name = "FuserAdapter::getxattr", skip(self, _req, reply))]
    fn getxattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: fuser::ReplyXattr,
    ) {
        let fs = Arc::clone(&self.fs);
        let name = name.to_owned();
        self.runtime.spawn(async move {
            match fs.getxattr(ino, &name).await {
                Ok(value) => reply_xattr(reply, size, &value),
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }

    #[instrument(name = "FuserAdapter::listxattr", skip(self, _req, reply))]
    fn listxattr(&mut self, _req: &fuser::Request<'_>, ino: u64, size: u32, reply: fuser::ReplyXattr) {
        let fs = Arc::clone(&self.fs);
        self.runtime.spawn(async move {
            match fs.listxattr(ino).await {
                Ok(names) => reply_xattr(reply, size, &names),
                Err(e) => {
                    debug!(error = %e, "replying error");
                    reply.error(e.into());
                }
            }
        });
    }
}
