//! The synthetic filesystem: a catalog, an enumerator and a read engine behind [`Fs`].
use std::ffi::OsStr;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::catalog::InodeCatalog;
use super::dirent::{DirectoryEnumerator, DirentBatch};
use super::error::BuildError;
use super::r#trait::Fs;
use super::read::ReadEngine;
use super::source::SourceBuffer;
use super::{
    DEFAULT_BUFFER_LEN, DEFAULT_FILE_NAME, DEFAULT_FILE_SIZE, FILE_INODE, FsError, FsStats, INode,
    InodeAddr,
};

const BLOCK_SIZE: u32 = 4096;

const NAME_MAX: u32 = 255;

/// Parameters of the namespace and its backing buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthFsOptions {
    /// Name of the served file inside the root directory.
    pub file_name: String,
    /// Declared size of the served file.
    pub file_size: u64,
    /// Length of the backing buffer.
    pub buffer_len: usize,
    /// Seed for the buffer content. `None` draws from system entropy.
    pub seed: Option<u64>,
    /// Owner reported for every inode.
    pub uid: u32,
    /// Group reported for every inode.
    pub gid: u32,
}

impl Default for SynthFsOptions {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_owned(),
            file_size: DEFAULT_FILE_SIZE,
            buffer_len: DEFAULT_BUFFER_LEN,
            seed: None,
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }
}

impl SynthFsOptions {
    /// Check the options without building anything.
    pub fn validate(&self) -> Result<(), BuildError> {
        validate_file_name(&self.file_name)?;
        if self.buffer_len == 0 {
            return Err(BuildError::EmptySource);
        }
        if self.buffer_len as u64 > self.file_size {
            return Err(BuildError::SourceLargerThanFile {
                buffer_len: self.buffer_len,
                file_size: self.file_size,
            });
        }
        Ok(())
    }
}

fn validate_file_name(name: &str) -> Result<(), BuildError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name == "." || name == ".." {
        "is reserved"
    } else if name.contains('/') {
        "must not contain '/'"
    } else if name.contains('\0') {
        "must not contain NUL"
    } else if name.len() > NAME_MAX as usize {
        "is longer than 255 bytes"
    } else {
        return Ok(());
    };
    Err(BuildError::InvalidFileName(name.to_owned(), reason))
}

/// A root directory holding one file whose content is a random buffer repeated to its full size.
///
/// Everything is built in the constructor and immutable afterwards, so a `SynthFs` can be shared
/// behind an `Arc` and queried from any number of tasks at once.
#[derive(Debug, Clone)]
pub struct SynthFs {
    catalog: InodeCatalog,
    engine: ReadEngine,
}

impl SynthFs {
    /// Validate `options`, generate the backing buffer and build the namespace.
    pub fn new(options: &SynthFsOptions) -> Result<Self, BuildError> {
        options.validate()?;
        let source = match options.seed {
            Some(seed) => SourceBuffer::seeded(options.buffer_len, seed),
            None => SourceBuffer::random(options.buffer_len),
        }
        .ok_or(BuildError::EmptySource)?;
        Self::with_source(options, source)
    }

    /// Build the namespace around an existing buffer. `buffer_len` and `seed` are ignored.
    pub fn with_source(options: &SynthFsOptions, source: SourceBuffer) -> Result<Self, BuildError> {
        validate_file_name(&options.file_name)?;
        let buffer_len = source.len();
        let engine = ReadEngine::new(source, options.file_size)?;
        let catalog = InodeCatalog::new(
            &options.file_name,
            options.file_size,
            options.uid,
            options.gid,
        );

        info!(
            file_name = %options.file_name,
            file_size = options.file_size,
            buffer_len,
            "Synthetic filesystem ready."
        );
        Ok(Self { catalog, engine })
    }

    /// The inode table.
    #[must_use]
    pub fn catalog(&self) -> &InodeCatalog {
        &self.catalog
    }

    /// The engine serving the file's content.
    #[must_use]
    pub fn engine(&self) -> &ReadEngine {
        &self.engine
    }

    /// An enumerator over this filesystem's directories.
    #[must_use]
    pub fn enumerator(&self) -> DirectoryEnumerator<'_> {
        DirectoryEnumerator::new(&self.catalog)
    }

    fn engine_for(&self, ino: InodeAddr) -> Result<&ReadEngine, FsError> {
        let inode = self.catalog.get_attributes(ino)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory(ino));
        }
        debug_assert_eq!(ino, FILE_INODE, "the catalog serves exactly one file");
        Ok(&self.engine)
    }
}

#[async_trait]
impl Fs for SynthFs {
    type Error = FsError;

    async fn lookup(&self, parent: InodeAddr, name: &OsStr) -> Result<INode, FsError> {
        self.catalog.lookup_child(parent, name)
    }

    async fn getattr(&self, ino: InodeAddr) -> Result<INode, FsError> {
        self.catalog.get_attributes(ino)
    }

    async fn readdir(
        &self,
        ino: InodeAddr,
        cursor: u64,
        capacity: usize,
    ) -> Result<DirentBatch, FsError> {
        self.enumerator().enumerate(ino, cursor, capacity)
    }

    async fn read(&self, ino: InodeAddr, offset: u64, size: u32) -> Result<Bytes, FsError> {
        let output = self.engine_for(ino)?.read(offset, size as usize, None)?;
        Ok(output.data.into_bytes())
    }

    async fn read_into(
        &self,
        ino: InodeAddr,
        offset: u64,
        size: u32,
        dest: &mut [u8],
    ) -> Result<usize, FsError> {
        let output = self
            .engine_for(ino)?
            .read(offset, size as usize, Some(dest))?;
        Ok(output.produced)
    }

    async fn statfs(&self) -> FsStats {
        let stats = FsStats {
            block_size: BLOCK_SIZE,
            total_blocks: self.engine.file_size().div_ceil(u64::from(BLOCK_SIZE)),
            free_blocks: 0,
            available_blocks: 0,
            total_inodes: self.catalog.len() as u64,
            free_inodes: 0,
            max_filename_length: NAME_MAX,
        };
        debug!(?stats, "placeholder filesystem statistics");
        stats
    }
}
