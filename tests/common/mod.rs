#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use synth_fs::fs::source::SourceBuffer;
use synth_fs::fs::synth::{SynthFs, SynthFsOptions};

pub const TEST_UID: u32 = 1000;
pub const TEST_GID: u32 = 1000;

/// A buffer whose byte `i` is `i mod 256`, so every position is recognizable.
pub fn ramp(len: usize) -> SourceBuffer {
    #[expect(clippy::cast_possible_truncation, reason = "wrapping is the point")]
    let bytes: Vec<u8> = (0..len).map(|i| i as u8).collect();
    SourceBuffer::from_bytes(bytes).unwrap()
}

/// What the served file holds at `[offset, offset + len)` when backed by `ramp(buffer_len)`.
#[expect(clippy::cast_possible_truncation, reason = "wrapping is the point")]
pub fn expected(offset: u64, len: usize, buffer_len: usize) -> Vec<u8> {
    (0..len as u64)
        .map(|i| ((offset + i) % buffer_len as u64) as u8)
        .collect()
}

pub fn options(file_size: u64) -> SynthFsOptions {
    SynthFsOptions {
        file_size,
        uid: TEST_UID,
        gid: TEST_GID,
        ..SynthFsOptions::default()
    }
}

/// A filesystem serving `file_size` bytes replayed from `ramp(buffer_len)`.
pub fn synth_fs(file_size: u64, buffer_len: usize) -> SynthFs {
    SynthFs::with_source(&options(file_size), ramp(buffer_len)).unwrap()
}
