//! synth-fs shared library.
//!
//! A read-only virtual filesystem which exposes one directory holding one enormous file. Reads
//! against the file are answered by replaying a much smaller in-memory random buffer with modular
//! wraparound, which makes it useful for measuring raw filesystem read throughput without any
//! storage underneath.

/// Filesystem core and the FUSE dispatcher.
pub mod fs;
