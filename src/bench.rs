//! In-process read throughput, measured straight against [`Fs`] without a mount.
//!
//! Useful as a ceiling: whatever a FUSE mount achieves on top of this is kernel overhead.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use synth_fs::fs::r#trait::Fs;
use synth_fs::fs::synth::SynthFs;
use synth_fs::fs::{FILE_INODE, FsError};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, Instrument as _};

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Block size {0} must be between 1 byte and 4 GiB.")]
    BlockSize(ByteSize),

    #[error("Read failed: {0}")]
    Fs(#[from] FsError),

    #[error("Reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What to read and how.
#[derive(Debug, Clone, Copy)]
pub struct BenchParams {
    /// Bytes to read across all jobs. Capped at the file size.
    pub total: u64,
    /// Bytes requested per read.
    pub block_size: ByteSize,
    /// Concurrent readers, each covering a disjoint region.
    pub jobs: NonZeroUsize,
    /// Let the filesystem allocate every output instead of reusing one buffer per job.
    pub allocate: bool,
}

/// Outcome of [`run`].
#[derive(Debug, Clone, Copy)]
pub struct BenchReport {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl BenchReport {
    /// Bytes per second, or zero if nothing was timed.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "throughput is reported, not accounted"
    )]
    pub fn throughput(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0;
        }
        (self.bytes as f64 / secs) as u64
    }
}

async fn read_region(
    fs: Arc<SynthFs>,
    start: u64,
    end: u64,
    block_size: u32,
    allocate: bool,
) -> Result<u64, FsError> {
    let mut buf = if allocate {
        Vec::new()
    } else {
        vec![0u8; block_size as usize]
    };

    let mut offset = start;
    while offset < end {
        let size = u32::try_from(end - offset).map_or(block_size, |left| left.min(block_size));
        let produced = if allocate {
            std::hint::black_box(fs.read(FILE_INODE, offset, size).await?).len()
        } else {
            let dest = &mut buf[..size as usize];
            let n = fs.read_into(FILE_INODE, offset, size, dest).await?;
            std::hint::black_box(&buf[..n]);
            n
        };
        if produced == 0 {
            break;
        }
        offset += produced as u64;
    }
    Ok(offset - start)
}

/// Read `params.total` bytes of the served file from `params.jobs` concurrent tasks.
pub async fn run(fs: Arc<SynthFs>, params: BenchParams) -> Result<BenchReport, BenchError> {
    let block_size = u32::try_from(params.block_size.as_u64())
        .ok()
        .filter(|&b| b > 0)
        .ok_or(BenchError::BlockSize(params.block_size))?;

    let total = params.total.min(fs.engine().file_size());
    let jobs = params.jobs.get() as u64;
    let per_job = total.div_ceil(jobs);

    info!(
        total = %ByteSize::b(total),
        block_size = %params.block_size,
        jobs,
        allocate = params.allocate,
        "Starting read benchmark."
    );

    let started = Instant::now();
    let mut readers = JoinSet::new();
    for job in 0..jobs {
        let start = (job * per_job).min(total);
        let end = (start + per_job).min(total);
        debug!(job, start, end, "spawning reader");
        readers.spawn(
            read_region(Arc::clone(&fs), start, end, block_size, params.allocate)
                .instrument(info_span!("bench::reader", job)),
        );
    }

    let mut bytes = 0;
    while let Some(joined) = readers.join_next().await {
        bytes += joined??;
    }

    let report = BenchReport {
        bytes,
        elapsed: started.elapsed(),
    };
    info!(
        bytes = %ByteSize::b(report.bytes),
        elapsed = ?report.elapsed,
        throughput = %format!("{}/s", ByteSize::b(report.throughput())),
        "Benchmark finished."
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_fs::fs::source::SourceBuffer;
    use synth_fs::fs::synth::SynthFsOptions;

    fn small_fs() -> Arc<SynthFs> {
        let options = SynthFsOptions {
            file_size: 10_000,
            ..SynthFsOptions::default()
        };
        let source = SourceBuffer::seeded(64, 1).unwrap();
        Arc::new(SynthFs::with_source(&options, source).unwrap())
    }

    fn params(total: u64, block: u64, jobs: usize, allocate: bool) -> BenchParams {
        BenchParams {
            total,
            block_size: ByteSize::b(block),
            jobs: NonZeroUsize::new(jobs).unwrap(),
            allocate,
        }
    }

    #[tokio::test]
    async fn reads_exactly_the_requested_total() {
        let report = run(small_fs(), params(5_000, 300, 3, false)).await.unwrap();
        assert_eq!(report.bytes, 5_000);

        let report = run(small_fs(), params(5_000, 300, 3, true)).await.unwrap();
        assert_eq!(report.bytes, 5_000);
    }

    #[tokio::test]
    async fn total_is_capped_at_file_size() {
        let report = run(small_fs(), params(1 << 20, 4096, 4, false)).await.unwrap();
        assert_eq!(report.bytes, 10_000);
    }

    #[tokio::test]
    async fn more_jobs_than_bytes_is_fine() {
        let report = run(small_fs(), params(3, 1, 8, true)).await.unwrap();
        assert_eq!(report.bytes, 3);
    }

    #[tokio::test]
    async fn zero_block_size_is_rejected() {
        let err = run(small_fs(), params(100, 0, 1, false)).await.unwrap_err();
        assert!(matches!(err, BenchError::BlockSize(_)));
    }
}
