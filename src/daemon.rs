//! Mount lifecycle: ready the directory, mount, serve until signalled, tear down.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fuser::{BackgroundSession, MountOption};
use nix::errno::Errno;
use synth_fs::fs::error::BuildError;
use synth_fs::fs::fuser::FuserAdapter;
use synth_fs::fs::synth::SynthFs;
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

use crate::app_config;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to build the filesystem: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

const UNMOUNT_RETRIES: u32 = 10;
const UNMOUNT_BACKOFF: Duration = Duration::from_millis(10);

fn mount_options(config: &app_config::Config) -> Vec<MountOption> {
    let mut opts = vec![
        MountOption::FSName("synth-fs".to_owned()),
        MountOption::RO,
        MountOption::NoDev,
        MountOption::NoSuid,
        MountOption::DefaultPermissions,
    ];
    if config.fuse.allow_other {
        opts.extend([MountOption::AllowOther, MountOption::AutoUnmount]);
    }
    opts
}

#[cfg(target_os = "linux")]
fn detach(mount_point: &Path) -> nix::Result<()> {
    nix::mount::umount2(mount_point, nix::mount::MntFlags::MNT_DETACH)
}

#[cfg(target_os = "macos")]
fn detach(mount_point: &Path) -> nix::Result<()> {
    nix::mount::unmount(mount_point, nix::mount::MntFlags::MNT_FORCE)
}

/// A live mount. Dropping it ends the session, then detaches the mount point even if a reader
/// still holds it open.
struct Mount {
    mount_point: PathBuf,
    session: Option<BackgroundSession>,
}

impl Mount {
    fn new(
        config: &app_config::Config,
        fs: Arc<SynthFs>,
        handle: tokio::runtime::Handle,
    ) -> io::Result<Self> {
        let adapter = FuserAdapter::new(fs, handle, config.attr_ttl());
        let session = fuser::spawn_mount2(adapter, &config.mount_point, &mount_options(config))?;
        Ok(Self {
            mount_point: config.mount_point.clone(),
            session: Some(session),
        })
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        drop(self.session.take());

        for attempt in 1..=UNMOUNT_RETRIES {
            match detach(&self.mount_point) {
                Err(Errno::EBUSY) if attempt < UNMOUNT_RETRIES => {
                    debug!(attempt, "mount point busy");
                    std::thread::sleep(UNMOUNT_BACKOFF);
                }
                // Gone already, or not ours to detach: fusermount handled it on session drop.
                Ok(()) | Err(Errno::EINVAL | Errno::ENOENT | Errno::EPERM) => {
                    debug!(attempt, mount_point = %self.mount_point.display(), "unmounted");
                    return;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Could not unmount {}.", self.mount_point.display());
                    return;
                }
            }
        }
    }
}

/// Create the mount point if missing. An existing directory must be empty.
async fn prepare_mount_point(mount_point: &Path) -> io::Result<()> {
    let mut entries = match tokio::fs::read_dir(mount_point).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(mount_point).await?;
            info!(path = %mount_point.display(), "Created mount point directory.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if entries.next_entry().await?.is_some() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Refusing to mount over non-empty '{}'.", mount_point.display()),
        ));
    }
    Ok(())
}

/// Resolve once SIGINT, SIGTERM or SIGHUP arrives, returning which one.
async fn shutdown_signal() -> io::Result<&'static str> {
    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    let name = tokio::select! {
        res = tokio::signal::ctrl_c() => { res?; "SIGINT" },
        _ = term.recv() => "SIGTERM",
        _ = hup.recv() => "SIGHUP",
    };
    Ok(name)
}

/// Mount `fs` and serve it until a termination signal arrives.
pub async fn run(
    config: app_config::Config,
    fs: Arc<SynthFs>,
    handle: tokio::runtime::Handle,
) -> io::Result<()> {
    prepare_mount_point(&config.mount_point).await?;

    let mount = Mount::new(&config, fs, handle)?;
    info!(
        "Serving {} at {}. Press Ctrl+C to stop.",
        config.file.name,
        config.mount_point.display()
    );

    let signal = shutdown_signal().await?;
    warn!(signal, "Shutting down.");
    drop(mount);
    Ok(())
}

/// Build the filesystem described by `config`, mount it, and block until shutdown.
pub fn spawn(config: app_config::Config) -> Result<(), DaemonError> {
    let options = config.synth_options().map_err(DaemonError::Config)?;
    let fs = Arc::new(SynthFs::new(&options)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, fs, runtime.handle().clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("synth-fs-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn missing_mount_point_is_created() {
        let dir = scratch_dir("missing").join("nested");
        prepare_mount_point(&dir).await.unwrap();
        assert!(dir.is_dir());
        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn empty_mount_point_is_accepted() {
        let dir = scratch_dir("empty");
        std::fs::create_dir_all(&dir).unwrap();
        prepare_mount_point(&dir).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn non_empty_mount_point_is_refused() {
        let dir = scratch_dir("occupied");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("leftover"), b"x").unwrap();

        let err = prepare_mount_point(&dir).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn mount_is_read_only_and_shares_only_when_asked() {
        let mut config = app_config::Config::default();
        let opts = mount_options(&config);
        assert!(opts.contains(&MountOption::RO));
        assert!(!opts.contains(&MountOption::AllowOther));

        config.fuse.allow_other = true;
        let opts = mount_options(&config);
        assert!(opts.contains(&MountOption::AllowOther));
        assert!(opts.contains(&MountOption::AutoUnmount));
    }
}
