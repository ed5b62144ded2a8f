//! Shared folder layout.
//!
//! ```text
//! <root>/uoccin.json                         state store
//! <root>/uoccin.toml                         shared format config (optional)
//! <root>/device.<id>/                        inbox of device <id>
//! <root>/device.<id>/<ts>.<author>.diff      diff log
//! <root>/device.<id>/<ts>.<id>.diff.manifest delivery manifest (own logs)
//! <root>/device.<id>/.lock                   run lock
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ErrorCode;

/// File name of the state store.
pub const STORE_FILE: &str = "uoccin.json";
/// File name of the shared format config.
pub const SHARED_CONFIG_FILE: &str = "uoccin.toml";
/// Prefix of every inbox directory.
pub const INBOX_PREFIX: &str = "device.";
/// Name of the run lock inside an inbox.
pub const LOCK_FILE: &str = ".lock";

/// A device identity. Non-empty ASCII letters, digits, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

/// Rejected device identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device id '{0}': use only ASCII letters, digits, '-' and '_'")]
pub struct InvalidDeviceId(pub String);

impl InvalidDeviceId {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidDeviceId
    }
}

impl DeviceId {
    /// Validate and wrap a device identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDeviceId`] for empty ids or ids containing anything
    /// but ASCII alphanumerics, `-` and `_`.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidDeviceId> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid { Ok(Self(raw)) } else { Err(InvalidDeviceId(raw)) }
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = InvalidDeviceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = InvalidDeviceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Paths inside one shared folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFolder {
    root: PathBuf,
}

impl SharedFolder {
    /// Wrap a shared folder root. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The shared folder root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/uoccin.json`
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// `<root>/uoccin.toml`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(SHARED_CONFIG_FILE)
    }

    /// `<root>/device.<id>`
    #[must_use]
    pub fn inbox_dir(&self, device: &DeviceId) -> PathBuf {
        self.root.join(format!("{INBOX_PREFIX}{device}"))
    }

    /// `<root>/device.<id>/.lock`
    #[must_use]
    pub fn lock_path(&self, device: &DeviceId) -> PathBuf {
        self.inbox_dir(device).join(LOCK_FILE)
    }

    /// Create this device's inbox if missing. Returns the inbox path.
    ///
    /// # Errors
    ///
    /// Propagates directory creation failures.
    pub fn ensure_inbox(&self, device: &DeviceId) -> io::Result<PathBuf> {
        let dir = self.inbox_dir(device);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Every device with an inbox directory, sorted.
    ///
    /// Directories whose suffix is not a valid device id are ignored. A
    /// missing root yields an empty list.
    ///
    /// # Errors
    ///
    /// Propagates directory listing failures other than `NotFound`.
    pub fn list_devices(&self) -> io::Result<Vec<DeviceId>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_prefix(INBOX_PREFIX)
                && let Ok(device) = DeviceId::new(id)
            {
                devices.push(device);
            }
        }
        devices.sort();
        Ok(devices)
    }

    /// Every device except `device`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_devices`].
    pub fn siblings(&self, device: &DeviceId) -> io::Result<Vec<DeviceId>> {
        let mut devices = self.list_devices()?;
        devices.retain(|d| d != device);
        Ok(devices)
    }
}
