#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::ffi::{OsStr, OsString};

use synth_fs::fs::catalog::{DirEntry, InodeCatalog};
use synth_fs::fs::dirent::{DIRENT_HEADER_LEN, DirectoryEnumerator, DirentBatch, dirent_len};
use synth_fs::fs::{FILE_INODE, FsError, INodeType, InodeAddr, ROOT_INODE};

use common::{TEST_GID, TEST_UID};

fn catalog(name: &str) -> InodeCatalog {
    InodeCatalog::new(name, 1 << 20, TEST_UID, TEST_GID)
}

/// Drain `parent` by resuming from the last returned cursor until an empty batch comes back.
fn drain(
    enumerator: DirectoryEnumerator<'_>,
    parent: InodeAddr,
    capacity: usize,
) -> Vec<(InodeAddr, u64, String)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    loop {
        let batch = enumerator.enumerate(parent, cursor, capacity).unwrap();
        assert!(batch.bytes_produced() <= capacity);
        let Some(last) = batch.last_cursor() else {
            return out;
        };
        out.extend(
            batch
                .iter()
                .map(|e| (e.ino, e.cursor, e.name.to_string_lossy().into_owned())),
        );
        cursor = last;
    }
}

#[test]
fn dirent_len_is_header_plus_padded_name() {
    assert_eq!(DIRENT_HEADER_LEN, 24);
    assert_eq!(dirent_len(1), 32);
    assert_eq!(dirent_len(4), 32);
    assert_eq!(dirent_len(8), 32);
    assert_eq!(dirent_len(9), 40);
    assert_eq!(dirent_len(255), 280);
}

#[test]
fn full_listing_in_one_batch() {
    let catalog = catalog("test");
    let batch = DirectoryEnumerator::new(&catalog)
        .enumerate(ROOT_INODE, 0, 4096)
        .unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.bytes_produced(), dirent_len(4));
    assert_eq!(batch.last_cursor(), Some(1));

    let entry = batch.iter().next().unwrap();
    assert_eq!(entry.ino, FILE_INODE);
    assert_eq!(entry.cursor, 1);
    assert_eq!(entry.itype, INodeType::File);
    assert_eq!(entry.name, OsStr::new("test"));
}

#[test]
fn encoding_matches_fuse_dirent_layout() {
    let catalog = catalog("test");
    let batch = DirectoryEnumerator::new(&catalog)
        .enumerate(ROOT_INODE, 0, 4096)
        .unwrap();
    let bytes = batch.as_bytes();

    assert_eq!(bytes.len(), 32);
    assert_eq!(u64::from_ne_bytes(bytes[0..8].try_into().unwrap()), FILE_INODE);
    assert_eq!(u64::from_ne_bytes(bytes[8..16].try_into().unwrap()), 1);
    assert_eq!(u32::from_ne_bytes(bytes[16..20].try_into().unwrap()), 4);
    assert_eq!(
        u32::from_ne_bytes(bytes[20..24].try_into().unwrap()),
        u32::from(libc::DT_REG)
    );
    assert_eq!(&bytes[24..28], b"test");
    assert_eq!(&bytes[28..32], &[0, 0, 0, 0], "padding must be zeroed");
}

#[test]
fn cursor_at_end_is_an_empty_success() {
    let catalog = catalog("test");
    let batch = DirectoryEnumerator::new(&catalog)
        .enumerate(ROOT_INODE, 1, 4096)
        .unwrap();

    assert!(batch.is_empty());
    assert_eq!(batch.bytes_produced(), 0);
    assert_eq!(batch.last_cursor(), None);
    assert_eq!(batch.iter().count(), 0);
}

#[test]
fn cursor_past_end_is_invalid() {
    let catalog = catalog("test");
    let enumerator = DirectoryEnumerator::new(&catalog);

    assert_eq!(
        enumerator.enumerate(ROOT_INODE, 2, 4096).unwrap_err(),
        FsError::InvalidCursor {
            cursor: 2,
            entries: 1
        }
    );
    assert!(matches!(
        enumerator.enumerate(ROOT_INODE, u64::MAX, 4096),
        Err(FsError::InvalidCursor { .. })
    ));
}

#[test]
fn enumerating_the_file_is_not_a_directory() {
    let catalog = catalog("test");
    assert_eq!(
        DirectoryEnumerator::new(&catalog)
            .enumerate(FILE_INODE, 0, 4096)
            .unwrap_err(),
        FsError::NotADirectory(FILE_INODE)
    );
}

#[test]
fn enumerating_an_unknown_parent_is_not_found() {
    let catalog = catalog("test");
    assert_eq!(
        DirectoryEnumerator::new(&catalog)
            .enumerate(99, 0, 4096)
            .unwrap_err(),
        FsError::NotFound
    );
}

#[test]
fn entries_are_never_split() {
    let catalog = catalog("test");
    let enumerator = DirectoryEnumerator::new(&catalog);
    let needed = dirent_len(4);

    for capacity in 0..needed {
        let batch = enumerator.enumerate(ROOT_INODE, 0, capacity).unwrap();
        assert!(
            batch.is_empty(),
            "capacity {capacity} cannot hold a {needed} byte entry"
        );
        assert_eq!(batch.bytes_produced(), 0);
    }

    let batch = enumerator.enumerate(ROOT_INODE, 0, needed).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.bytes_produced(), needed);
}

#[test]
fn resumption_is_independent_of_capacity() {
    let catalog = catalog("a-fairly-long-file-name.bin");
    let enumerator = DirectoryEnumerator::new(&catalog);
    let full = drain(enumerator, ROOT_INODE, 4096);
    assert_eq!(full.len(), 1);

    let needed = dirent_len("a-fairly-long-file-name.bin".len());
    for capacity in needed..=4 * needed {
        assert_eq!(
            drain(enumerator, ROOT_INODE, capacity),
            full,
            "capacity {capacity} changed the listing"
        );
    }
}

#[test]
fn repeated_enumeration_is_identical() {
    let catalog = catalog("test");
    let enumerator = DirectoryEnumerator::new(&catalog);
    let first = enumerator.enumerate(ROOT_INODE, 0, 4096).unwrap();
    let second = enumerator.enumerate(ROOT_INODE, 0, 4096).unwrap();
    assert_eq!(first, second);
}

const MIXED_NAMES: [&str; 5] = [
    "a",
    "eight-ch",
    "nine-char",
    "x",
    "a-name-that-spans-several-words.dat",
];

fn mixed_listing() -> Vec<DirEntry> {
    MIXED_NAMES
        .iter()
        .zip(1_u64..)
        .map(|(name, cursor)| DirEntry {
            cursor,
            ino: 100 + cursor,
            name: OsString::from(name),
            itype: if cursor % 2 == 0 {
                INodeType::Directory
            } else {
                INodeType::File
            },
        })
        .collect()
}

/// Drain `listing` from the start, returning the decoded cursors and how many calls it took.
fn drain_listing(
    listing: &[DirEntry],
    capacity: usize,
) -> (Vec<(u64, InodeAddr, OsString)>, usize) {
    let mut out = Vec::new();
    let mut calls = 0;
    let mut cursor = 0;
    loop {
        calls += 1;
        let batch = DirentBatch::from_listing(listing, cursor, capacity).unwrap();
        assert!(batch.bytes_produced() <= capacity);
        let Some(last) = batch.last_cursor() else {
            return (out, calls);
        };
        out.extend(batch.iter().map(|e| (e.cursor, e.ino, e.name.to_owned())));
        cursor = last;
    }
}

#[test]
fn multi_entry_listing_drains_in_rank_order_at_every_capacity() {
    let listing = mixed_listing();
    let full_len: usize = MIXED_NAMES.iter().map(|n| dirent_len(n.len())).sum();
    let max_entry = MIXED_NAMES.iter().map(|n| dirent_len(n.len())).max().unwrap();

    let expected: Vec<_> = listing
        .iter()
        .map(|e| (e.cursor, e.ino, e.name.clone()))
        .collect();

    let (whole, calls) = drain_listing(&listing, full_len);
    assert_eq!(whole, expected);
    assert_eq!(calls, 2, "one full batch then the empty end-of-listing batch");

    for capacity in max_entry..=full_len {
        let (chunked, _) = drain_listing(&listing, capacity);
        assert_eq!(chunked, expected, "capacity {capacity} changed the listing");
    }

    let (one_by_one, calls) = drain_listing(&listing, max_entry);
    assert_eq!(one_by_one, expected);
    assert!(calls > listing.len() / 2, "a small capacity must force several calls");
}

#[test]
fn capacity_below_the_next_entry_stops_before_it() {
    let listing = mixed_listing();
    let first_two = dirent_len(1) + dirent_len(8);

    let batch = DirentBatch::from_listing(&listing, 0, first_two + dirent_len(9) - 1).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.bytes_produced(), first_two);
    assert_eq!(batch.last_cursor(), Some(2));
}

#[test]
fn resuming_mid_listing_starts_at_the_next_rank() {
    let listing = mixed_listing();

    let batch = DirentBatch::from_listing(&listing, 1, 4096).unwrap();
    let cursors: Vec<u64> = batch.iter().map(|e| e.cursor).collect();
    assert_eq!(cursors, vec![2, 3, 4, 5]);
    assert_eq!(batch.iter().next().unwrap().name, OsStr::new("eight-ch"));
    assert_eq!(batch.iter().next().unwrap().itype, INodeType::Directory);

    let tail = DirentBatch::from_listing(&listing, 4, 4096).unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail.last_cursor(), Some(5));

    assert!(DirentBatch::from_listing(&listing, 5, 4096).unwrap().is_empty());
    assert_eq!(
        DirentBatch::from_listing(&listing, 6, 4096).unwrap_err(),
        FsError::InvalidCursor {
            cursor: 6,
            entries: 5
        }
    );
}
