//! Serve one enormous file of replayed random bytes, to measure how fast reads can go.
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use bytesize::ByteSize;
use clap::{Parser, Subcommand};
use synth_fs::fs::synth::SynthFs;
use tracing::{debug, error, info};

mod app_config;
mod bench;
mod daemon;
mod fuse_check;
mod trc;

use crate::app_config::{Config, ConfigError};
use crate::trc::Trc;

const BUILD_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

#[derive(Parser)]
#[command(
    version,
    about = "A synthetic read-only filesystem for benchmarking read throughput."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a synth-fs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity. Repeat for more."
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Settings that may be given on the command line instead of in the config file.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Where to mount the filesystem.
    #[arg(long)]
    mount_point: Option<PathBuf>,

    /// Declared size of the served file, e.g. "1 TiB".
    #[arg(long)]
    file_size: Option<ByteSize>,

    /// Size of the in-memory buffer the content is replayed from, e.g. "256 MiB".
    #[arg(long)]
    buffer_size: Option<ByteSize>,

    /// Seed the buffer for reproducible content.
    #[arg(long)]
    seed: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(mount_point) = self.mount_point {
            config.mount_point = mount_point;
        }
        if let Some(size) = self.file_size {
            config.file.size = size;
        }
        if let Some(size) = self.buffer_size {
            config.source.size = size;
        }
        if let Some(seed) = self.seed {
            config.source.seed = Some(seed);
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Mount the filesystem and serve it until interrupted.
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Measure read throughput in-process, without mounting anything.
    Bench {
        #[command(flatten)]
        overrides: Overrides,

        /// Bytes to read in total.
        #[arg(long, default_value = "16 GiB")]
        total: ByteSize,

        /// Bytes per read call.
        #[arg(long, default_value = "128 KiB")]
        block_size: ByteSize,

        /// Concurrent readers.
        #[arg(long, default_value = "4")]
        jobs: NonZeroUsize,

        /// Have the filesystem allocate every read instead of filling a reused buffer.
        #[arg(long)]
        allocate: bool,
    },

    /// Print the effective configuration as TOML.
    ShowConfig {
        #[command(flatten)]
        overrides: Overrides,
    },
}

impl Command {
    fn take_overrides(&mut self) -> Overrides {
        match self {
            Self::Run { overrides }
            | Self::Bench { overrides, .. }
            | Self::ShowConfig { overrides } => std::mem::take(overrides),
        }
    }
}

fn run_bench(config: &Config, params: bench::BenchParams) -> Result<(), String> {
    let options = config.synth_options()?;
    let fs = Arc::new(SynthFs::new(&options).map_err(|e| e.to_string())?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create Tokio runtime: {e}"))?;
    runtime
        .block_on(bench::run(fs, params))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();
    let mut command = args.command.unwrap_or(Command::Run {
        overrides: Overrides::default(),
    });

    // Errors use eprintln since tracing isn't initialized yet.
    let mut config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    command.take_overrides().apply(&mut config);
    let config = match config.validated() {
        Ok(config) => config,
        Err(ConfigError::ValidationErrors(error_messages)) => {
            eprintln!("Configuration is invalid.");
            for msg in &error_messages {
                eprintln!(" - {msg}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to validate configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Command::ShowConfig { .. } = command {
        match config.to_toml() {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("Failed to render configuration: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = Trc::default().with_verbosity(args.verbose).init() {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build = BUILD_SHA.get(..8).unwrap_or(BUILD_SHA),
        "Starting synth-fs."
    );
    debug!(config = ?config, "Loaded configuration.");

    match command {
        Command::Run { .. } => {
            if let Err(e) = fuse_check::ensure_fuse() {
                error!("{e}");
                std::process::exit(1);
            }

            if let Err(e) = daemon::spawn(config) {
                error!("Daemon failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Bench {
            total,
            block_size,
            jobs,
            allocate,
            ..
        } => {
            let params = bench::BenchParams {
                total: total.as_u64(),
                block_size,
                jobs,
                allocate,
            };
            if let Err(e) = run_bench(&config, params) {
                error!("Benchmark failed: {e}");
                std::process::exit(1);
            }
        }
        Command::ShowConfig { .. } => {}
    }
}
