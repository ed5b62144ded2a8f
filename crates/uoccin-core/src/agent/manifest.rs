//! Delivery manifest of a partially finished diff log.
//!
//! Sits next to the log as `<log>.manifest` while the log has not yet been
//! both reduced locally and delivered to every sibling:
//!
//! ```text
//! log: 1700000000000.laptop.diff
//! reduced: true
//! delivered: nas,tv
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::layout::DeviceId;

/// Suffix appended to a log path to get its manifest path.
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// Progress record of one own diff log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryManifest {
    /// File name of the log this manifest describes.
    pub log: String,
    /// The log has been folded into the local state store.
    pub reduced: bool,
    /// Siblings whose inbox already holds a complete copy.
    pub delivered: BTreeSet<DeviceId>,
}

impl DeliveryManifest {
    #[must_use]
    pub fn new(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            reduced: false,
            delivered: BTreeSet::new(),
        }
    }

    /// Path of the manifest for `log_path`.
    #[must_use]
    pub fn path_for(log_path: &Path) -> PathBuf {
        let mut name = log_path.as_os_str().to_os_string();
        name.push(MANIFEST_SUFFIX);
        PathBuf::from(name)
    }

    /// Serialize manifest to a human-readable format.
    #[must_use]
    pub fn to_string_repr(&self) -> String {
        let delivered: Vec<&str> = self.delivered.iter().map(DeviceId::as_str).collect();
        format!(
            "log: {}\nreduced: {}\ndelivered: {}\n",
            self.log,
            self.reduced,
            delivered.join(",")
        )
    }

    /// Parse a manifest from its string representation.
    ///
    /// Returns `None` if required fields are missing or unparseable.
    #[must_use]
    pub fn from_string_repr(s: &str) -> Option<Self> {
        let mut log = None;
        let mut reduced = None;
        let mut delivered = None;

        for line in s.lines() {
            if let Some(val) = line.strip_prefix("log: ") {
                log = Some(val.trim().to_string());
            } else if let Some(val) = line.strip_prefix("reduced: ") {
                reduced = val.trim().parse().ok();
            } else if let Some(val) = line.strip_prefix("delivered:") {
                delivered = val
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| DeviceId::new(s).ok())
                    .collect::<Option<BTreeSet<_>>>();
            }
        }

        Some(Self {
            log: log?,
            reduced: reduced?,
            delivered: delivered?,
        })
    }

    /// Read the manifest at `path`.
    ///
    /// `Ok(None)` when there is no manifest. `Ok(Some(Err(text)))` when the
    /// file exists but does not parse.
    ///
    /// # Errors
    ///
    /// Propagates read failures other than `NotFound`.
    pub fn load(path: &Path) -> io::Result<Option<Result<Self, String>>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::from_string_repr(&text).ok_or(text))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the manifest atomically.
    ///
    /// # Errors
    ///
    /// Propagates write and rename failures.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, self.to_string_repr())?;
        fs::rename(&tmp, path)
    }
}
