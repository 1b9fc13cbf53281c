#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::ffi::OsStr;

use synth_fs::fs::error::BuildError;
use synth_fs::fs::r#trait::Fs;
use synth_fs::fs::synth::{SynthFs, SynthFsOptions};
use synth_fs::fs::{FILE_INODE, FsError, INodeType, ROOT_INODE};

use common::{expected, options, ramp, synth_fs};

const FILE_SIZE: u64 = 1 << 40;
const BUFFER_LEN: usize = 256;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_attributes_and_lookup() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);

    let root = fs.getattr(ROOT_INODE).await.unwrap();
    assert_eq!(root.itype, INodeType::Directory);
    assert_eq!(root.nlink, 1);

    let file = fs.getattr(FILE_INODE).await.unwrap();
    assert_eq!(file.itype, INodeType::File);
    assert_eq!(file.size, FILE_SIZE);
    assert_eq!(file.permissions.bits(), 0o444);

    let child = fs.lookup(ROOT_INODE, OsStr::new("test")).await.unwrap();
    assert_eq!(child, file);

    assert_eq!(
        fs.lookup(ROOT_INODE, OsStr::new("missing")).await,
        Err(FsError::NotFound)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readdir_lists_the_file_then_ends() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);

    let batch = fs.readdir(ROOT_INODE, 0, 4096).await.unwrap();
    let names: Vec<_> = batch.iter().map(|e| e.name.to_owned()).collect();
    assert_eq!(names, vec![OsStr::new("test").to_owned()]);

    let end = fs
        .readdir(ROOT_INODE, batch.last_cursor().unwrap(), 4096)
        .await
        .unwrap();
    assert!(end.is_empty());

    assert!(matches!(
        fs.readdir(ROOT_INODE, 5, 4096).await,
        Err(FsError::InvalidCursor { .. })
    ));
    assert_eq!(
        fs.readdir(FILE_INODE, 0, 4096).await.unwrap_err(),
        FsError::NotADirectory(FILE_INODE)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn both_read_paths_agree() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);
    let offset = (1 << 33) + 250;

    let allocated = fs.read(FILE_INODE, offset, 600).await.unwrap();
    let mut dest = vec![0; 600];
    let produced = fs.read_into(FILE_INODE, offset, 600, &mut dest).await.unwrap();

    assert_eq!(produced, 600);
    assert_eq!(allocated.as_ref(), dest.as_slice());
    assert_eq!(dest, expected(offset, 600, BUFFER_LEN));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_at_and_past_the_end() {
    let fs = synth_fs(1024, BUFFER_LEN);

    assert!(fs.read(FILE_INODE, 1024, 16).await.unwrap().is_empty());
    assert_eq!(fs.read(FILE_INODE, 1020, 16).await.unwrap().len(), 4);
    assert!(matches!(
        fs.read(FILE_INODE, 1025, 16).await,
        Err(FsError::EndOfFile { .. })
    ));

    let mut dest = vec![0; 16];
    assert_eq!(
        fs.read_into(FILE_INODE, 1024, 16, &mut dest).await.unwrap(),
        0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_into_rejects_mismatched_destination() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);
    let mut dest = vec![0; 10];
    assert_eq!(
        fs.read_into(FILE_INODE, 0, 16, &mut dest).await.unwrap_err(),
        FsError::ProtocolMisuse {
            expected: 16,
            actual: 10
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reading_the_root_is_a_directory_error() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);
    assert_eq!(
        fs.read(ROOT_INODE, 0, 16).await.unwrap_err(),
        FsError::IsADirectory(ROOT_INODE)
    );
    assert_eq!(fs.read(3, 0, 16).await.unwrap_err(), FsError::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handle_operations_are_no_ops() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);

    let dh = fs.opendir(ROOT_INODE).await.unwrap();
    assert_eq!(dh, ROOT_INODE);
    fs.releasedir(ROOT_INODE, dh).await.unwrap();

    let fh = fs.open(FILE_INODE).await.unwrap();
    assert_eq!(fh, FILE_INODE);
    fs.flush(FILE_INODE, fh).await.unwrap();
    fs.release(FILE_INODE, fh).await.unwrap();

    fs.forget(FILE_INODE, 3).await;
    assert!(fs.getattr(FILE_INODE).await.is_ok(), "forget must not drop inodes");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nothing_has_extended_attributes() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);
    for ino in [ROOT_INODE, FILE_INODE] {
        assert!(fs.listxattr(ino).await.unwrap().is_empty());
        assert!(
            fs.getxattr(ino, OsStr::new("user.anything"))
                .await
                .unwrap()
                .is_empty()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn statfs_reports_a_placeholder_summary() {
    let fs = synth_fs(FILE_SIZE, BUFFER_LEN);
    let stats = fs.statfs().await;

    assert_eq!(stats.block_size, 4096);
    assert_eq!(stats.total_blocks, FILE_SIZE / 4096);
    assert_eq!(stats.free_blocks, 0);
    assert_eq!(stats.total_inodes, 2);
    assert_eq!(stats.max_filename_length, 255);
}

#[test]
fn options_are_validated() {
    let bad = |opts: SynthFsOptions| SynthFs::with_source(&opts, ramp(BUFFER_LEN)).unwrap_err();

    for name in ["", ".", "..", "a/b", "nul\0"] {
        let err = bad(SynthFsOptions {
            file_name: name.to_owned(),
            ..options(FILE_SIZE)
        });
        assert!(matches!(err, BuildError::InvalidFileName(..)), "{name:?}");
    }

    assert!(matches!(
        bad(SynthFsOptions {
            file_name: "x".repeat(256),
            ..options(FILE_SIZE)
        }),
        BuildError::InvalidFileName(..)
    ));

    assert_eq!(
        bad(options(100)),
        BuildError::SourceLargerThanFile {
            buffer_len: BUFFER_LEN,
            file_size: 100
        }
    );
}

#[test]
fn new_generates_a_seeded_buffer() {
    let opts = SynthFsOptions {
        buffer_len: 4096,
        seed: Some(42),
        ..options(1 << 20)
    };
    let a = SynthFs::new(&opts).unwrap();
    let b = SynthFs::new(&opts).unwrap();

    assert_eq!(a.engine().source().len(), 4096);
    assert_eq!(a.engine().source().as_bytes(), b.engine().source().as_bytes());
    assert_eq!(
        SynthFs::new(&SynthFsOptions {
            buffer_len: 0,
            ..opts
        })
        .unwrap_err(),
        BuildError::EmptySource
    );
}
