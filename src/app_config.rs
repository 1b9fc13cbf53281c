//! Module for application configuration settings.
//!
//! User configurations may be specified in a configuration file. Command line flags override
//! whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};
use synth_fs::fs::synth::SynthFsOptions;
use synth_fs::fs::{DEFAULT_BUFFER_LEN, DEFAULT_FILE_NAME, DEFAULT_FILE_SIZE};
use thiserror::Error;
use tracing::debug;

fn synth_runtime_dir() -> Option<PathBuf> {
    if let Some(path) = dirs::runtime_dir() {
        return Some(path.join("synth-fs"));
    }

    dirs::home_dir().map(|path| path.join(".local").join("share").join("synth-fs"))
}

fn default_mount_point() -> PathBuf {
    synth_runtime_dir().map_or_else(|| PathBuf::from("/tmp/synth-fs/mnt"), |rd| rd.join("mnt"))
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.to_owned()
}

fn default_file_size() -> ByteSize {
    ByteSize::b(DEFAULT_FILE_SIZE)
}

fn default_source_size() -> ByteSize {
    ByteSize::b(DEFAULT_BUFFER_LEN as u64)
}

fn default_attr_ttl_secs() -> u64 {
    3600
}

/// The served file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    /// Name of the file inside the mount point.
    #[serde(default = "default_file_name")]
    pub name: String,

    /// Declared size of the file.
    #[serde(default = "default_file_size")]
    pub size: ByteSize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            name: default_file_name(),
            size: default_file_size(),
        }
    }
}

/// The in-memory buffer the file's content is replayed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Length of the buffer. Held in memory for the lifetime of the process.
    #[serde(default = "default_source_size")]
    pub size: ByteSize,

    /// Seed for reproducible content. Drawn from system entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            size: default_source_size(),
            seed: None,
        }
    }
}

/// Mount and kernel caching options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FuseConfig {
    /// Let users other than the mounting one access the filesystem. Requires `user_allow_other`
    /// in `/etc/fuse.conf`.
    #[serde(default)]
    pub allow_other: bool,

    /// How long the kernel may cache attributes and lookups, in seconds.
    #[serde(default = "default_attr_ttl_secs")]
    pub attr_ttl_secs: u64,
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            allow_other: false,
            attr_ttl_secs: default_attr_ttl_secs(),
        }
    }
}

/// Application configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The mount point for the filesystem.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// The user reported as owner of every inode. If not specified, the current user.
    #[serde(default = "current_uid")]
    pub uid: u32,

    /// The group reported as owner of every inode. If not specified, the current group.
    #[serde(default = "current_gid")]
    pub gid: u32,

    #[serde(default)]
    pub file: FileConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub fuse: FuseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            uid: current_uid(),
            gid: current_gid(),
            file: FileConfig::default(),
            source: SourceConfig::default(),
            fuse: FuseConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation errors: {0:?}")]
    ValidationErrors(Vec<String>),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns:
    /// - `Ok(())` if the configuration is valid.
    /// - `Err(Vec<String>)` with every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.mount_point.parent().is_none() {
            errors.push(format!(
                "Mount point '{}' has no parent directory.",
                self.mount_point.display()
            ));
        }

        match self.synth_options() {
            Ok(options) => {
                if let Err(e) = options.validate() {
                    errors.push(format!("{e}."));
                }
            }
            Err(msg) => errors.push(msg),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Consume the configuration if it is valid, or report every problem at once.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().map_err(ConfigError::ValidationErrors)?;
        Ok(self)
    }

    /// The filesystem parameters described by this configuration.
    pub fn synth_options(&self) -> Result<SynthFsOptions, String> {
        let buffer_len = usize::try_from(self.source.size.as_u64()).map_err(|_| {
            format!(
                "Source size {} does not fit in this platform's address space.",
                self.source.size
            )
        })?;

        Ok(SynthFsOptions {
            file_name: self.file.name.clone(),
            file_size: self.file.size.as_u64(),
            buffer_len,
            seed: self.source.seed,
            uid: self.uid,
            gid: self.gid,
        })
    }

    /// How long the kernel may cache attributes.
    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.fuse.attr_ttl_secs)
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("synth-fs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".config").join("synth-fs").join("config.toml");
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        paths.push(PathBuf::from("/etc/synth-fs/config.toml"));

        paths
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads configuration from the first found config file, or the external path if given.
    pub fn load(external_config_path: Option<&Path>) -> Option<Result<Self, ConfigError>> {
        if let Some(path) = external_config_path {
            return Some(Self::load_from_file(path));
        }

        Self::config_search_paths()
            .into_iter()
            .find(|p| p.exists())
            .map(|path| Self::load_from_file(&path))
    }

    /// Loads config, falling back to defaults when no file exists.
    /// Errors if a config file exists but is malformed.
    pub fn load_or_default(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(external_config_path).unwrap_or_else(|| {
            debug!("No configuration file found, using defaults.");
            Ok(Self::default())
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
