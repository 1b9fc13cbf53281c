//! Tracing configuration and initialization.

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Environment variable holding the log filter. `RUST_LOG` is consulted when it is unset.
const LOG_ENV_VAR: &str = "SYNTH_FS_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrcMode {
    /// Plain, verbose rust logging with span enter/close events.
    Plain,
    /// Compact, colorful output with spinners for long-running spans.
    Pretty,
}

pub struct Trc {
    mode: TrcMode,
    env_filter: EnvFilter,
    from_env: bool,
}

impl Default for Trc {
    fn default() -> Self {
        let maybe_env_filter =
            EnvFilter::try_from_env(LOG_ENV_VAR).or_else(|_| EnvFilter::try_from_default_env());

        match maybe_env_filter {
            // An explicit filter means someone is debugging. Skip the spinners.
            Ok(env_filter) => Self {
                mode: TrcMode::Plain,
                env_filter,
                from_env: true,
            },
            Err(_) => Self {
                mode: TrcMode::Pretty,
                env_filter: EnvFilter::new("info"),
                from_env: false,
            },
        }
    }
}

impl Trc {
    /// Raise the level by `verbose` steps above `info`. An explicit environment filter wins.
    #[must_use]
    pub fn with_verbosity(self, verbose: u8) -> Self {
        if self.from_env || verbose == 0 {
            return self;
        }

        let level = if verbose == 1 { "debug" } else { "trace" };
        Self {
            mode: TrcMode::Plain,
            env_filter: EnvFilter::new(level),
            from_env: false,
        }
    }

    pub fn init(self) -> Result<(), TryInitError> {
        match self.mode {
            TrcMode::Plain => self.init_plain_mode(),
            TrcMode::Pretty => self.init_pretty_mode(),
        }
    }

    fn init_plain_mode(self) -> Result<(), TryInitError> {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter)
            .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
            .finish()
            .try_init()
    }

    fn init_pretty_mode(self) -> Result<(), TryInitError> {
        let indicatif_layer = IndicatifLayer::new();
        tracing_subscriber::registry()
            .with(self.env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(indicatif_layer.get_stderr_writer())
                    .with_target(false)
                    .without_time()
                    .compact(),
            )
            .with(indicatif_layer)
            .try_init()
    }
}
