//! FUSE availability checks, run before attempting a mount.

#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::path::Path;

#[cfg(target_os = "linux")]
const FUSE_DEVICE: &str = "/dev/fuse";

#[cfg(target_os = "macos")]
mod paths {
    pub const MACFUSE_FS_BUNDLE: &str = "/Library/Filesystems/macfuse.fs";
    pub const OSXFUSE_FS_BUNDLE: &str = "/Library/Filesystems/osxfuse.fs";
    pub const MACFUSE_MOUNT_HELPER: &str =
        "/Library/Filesystems/macfuse.fs/Contents/Resources/mount_macfuse";
    pub const OSXFUSE_MOUNT_HELPER: &str =
        "/Library/Filesystems/osxfuse.fs/Contents/Resources/mount_osxfuse";
}

/// Errors that can occur when verifying FUSE availability.
#[derive(Debug, thiserror::Error)]
pub enum FuseCheckError {
    /// The kernel FUSE device is absent.
    #[cfg(target_os = "linux")]
    #[error(
        "FUSE device {path} not found. Load the fuse kernel module (modprobe fuse) \
         or, in a container, pass the device through."
    )]
    DeviceMissing {
        /// Where the device was expected.
        path: &'static str,
    },

    /// macFUSE is not installed at all.
    #[cfg(target_os = "macos")]
    #[error(
        "macFUSE is not installed. synth-fs requires macFUSE to mount filesystems.\n\
         Install it from: https://macfuse.github.io/"
    )]
    NotInstalled,

    /// The mount helper binary is missing.
    #[cfg(target_os = "macos")]
    #[error(
        "macFUSE mount helper not found at {path}. Installation may be corrupt.\n\
         Reinstall from: https://macfuse.github.io/"
    )]
    MountHelperMissing {
        /// Path where the mount helper was expected.
        path: &'static str,
    },
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn require_file(path: &'static str, err: FuseCheckError) -> Result<(), FuseCheckError> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(err)
    }
}

/// Verify that FUSE is installed and usable on the current platform.
#[cfg(target_os = "linux")]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    require_file(
        FUSE_DEVICE,
        FuseCheckError::DeviceMissing { path: FUSE_DEVICE },
    )
}

/// Verify that FUSE is installed and usable on the current platform.
///
/// Checks for macFUSE, falling back to the older osxfuse bundle, and for its mount helper.
#[cfg(target_os = "macos")]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    let helper = if Path::new(paths::MACFUSE_FS_BUNDLE).is_dir() {
        paths::MACFUSE_MOUNT_HELPER
    } else if Path::new(paths::OSXFUSE_FS_BUNDLE).is_dir() {
        paths::OSXFUSE_MOUNT_HELPER
    } else {
        return Err(FuseCheckError::NotInstalled);
    };

    require_file(helper, FuseCheckError::MountHelperMissing { path: helper })
}

/// Verify that FUSE is installed and usable on the current platform.
///
/// Other platforms are left to fail at mount time.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    Ok(())
}
