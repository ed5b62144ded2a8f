//! Device identity, shared-folder root and log format settings.
//!
//! Device and root resolve from flags, then `UOCCIN_DEVICE`/`UOCCIN_ROOT`,
//! then the user config. Separators come from `<root>/uoccin.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::layout::{DeviceId, InvalidDeviceId, SharedFolder};

/// Environment variable naming this device.
pub const DEVICE_ENV: &str = "UOCCIN_DEVICE";
/// Environment variable naming the shared folder root.
pub const ROOT_ENV: &str = "UOCCIN_ROOT";

/// Delimiters used inside diff line fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Separates series id, season and episode in episode targets.
    #[serde(default = "default_target_separator")]
    pub target_separator: char,
    /// Separates items of `tags` and `subtitles` values.
    #[serde(default = "default_list_separator")]
    pub list_separator: char,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            target_separator: default_target_separator(),
            list_separator: default_list_separator(),
        }
    }
}

impl FormatConfig {
    /// Reject delimiters that would collide with the line format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFormat`] for `|`, whitespace, control
    /// characters or digits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, c) in [
            ("target_separator", self.target_separator),
            ("list_separator", self.list_separator),
        ] {
            if c == '|' || c.is_whitespace() || c.is_control() || c.is_ascii_digit() {
                return Err(ConfigError::InvalidFormat(format!(
                    "{name} cannot be {c:?}"
                )));
            }
        }
        Ok(())
    }
}

/// `<root>/uoccin.toml`, shared by every device of the folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub format: FormatConfig,
}

/// Per-user config at `<config_dir>/uoccin/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Everything a device run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub folder: SharedFolder,
    pub device: DeviceId,
    pub format: FormatConfig,
}

impl SyncConfig {
    /// Config with default delimiters.
    pub fn new(root: impl Into<PathBuf>, device: DeviceId) -> Self {
        Self {
            folder: SharedFolder::new(root),
            device,
            format: FormatConfig::default(),
        }
    }
}

/// Config errors that callers need to tell apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no device id: pass --device, set {DEVICE_ENV}, or set `device` in the user config")]
    DeviceNotConfigured,

    #[error(transparent)]
    InvalidDevice(#[from] InvalidDeviceId),

    #[error("invalid [format] section: {0}")]
    InvalidFormat(String),
}

impl ConfigError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DeviceNotConfigured => ErrorCode::DeviceNotConfigured,
            Self::InvalidDevice(_) => ErrorCode::InvalidDeviceId,
            Self::InvalidFormat(_) => ErrorCode::ConfigParseError,
        }
    }
}

/// Source of environment variables, swappable in tests.
pub trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Real process environment. Empty values count as unset.
pub struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Load `<root>/uoccin.toml`, or defaults when it does not exist.
///
/// # Errors
///
/// Fails if the file exists but cannot be read, parsed or validated.
pub fn load_shared_config(root: &Path) -> Result<SharedConfig> {
    let path = SharedFolder::new(root).config_path();
    if !path.exists() {
        return Ok(SharedConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<SharedConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .format
        .validate()
        .with_context(|| format!("Invalid {}", path.display()))?;
    Ok(config)
}

/// Load the user config from the platform config directory.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("uoccin/config.toml"))
}

/// Load a user config file, or defaults when it does not exist.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the device id: flag, then `UOCCIN_DEVICE`, then user config.
///
/// # Errors
///
/// Returns [`ConfigError::DeviceNotConfigured`] when no source names a
/// device, or [`ConfigError::InvalidDevice`] for a malformed id.
pub fn resolve_device_with(
    cli_flag: Option<&str>,
    env: &dyn EnvReader,
    user: &UserConfig,
) -> Result<DeviceId, ConfigError> {
    let raw = cli_flag
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| env.get(DEVICE_ENV))
        .or_else(|| user.device.clone().filter(|s| !s.is_empty()))
        .ok_or(ConfigError::DeviceNotConfigured)?;
    Ok(DeviceId::new(raw.trim())?)
}

/// Resolve the shared folder root: flag, then `UOCCIN_ROOT`, then user
/// config, then the current directory.
///
/// # Errors
///
/// Fails only when falling back to an unreadable current directory.
pub fn resolve_root_with(
    cli_flag: Option<&Path>,
    env: &dyn EnvReader,
    user: &UserConfig,
) -> Result<PathBuf> {
    if let Some(root) = cli_flag {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = env.get(ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }
    if let Some(root) = &user.root {
        return Ok(root.clone());
    }
    env::current_dir().context("Failed to determine current directory")
}

/// Full resolution against the real environment and user config.
///
/// # Errors
///
/// Propagates config loading and resolution failures. A missing device is
/// a [`ConfigError`] wrapped in the returned error.
pub fn resolve_config(device_flag: Option<&str>, root_flag: Option<&Path>) -> Result<SyncConfig> {
    let user = load_user_config()?;
    let root = resolve_root_with(root_flag, &RealEnv, &user)?;
    let device = resolve_device_with(device_flag, &RealEnv, &user)?;
    let shared = load_shared_config(&root)?;
    Ok(SyncConfig {
        folder: SharedFolder::new(root),
        device,
        format: shared.format,
    })
}

const fn default_target_separator() -> char {
    '.'
}

const fn default_list_separator() -> char {
    ','
}
