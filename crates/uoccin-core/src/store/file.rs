//! Loading and persisting `uoccin.json`.
//!
//! The document is pretty-printed with a 4-space indent and written to a
//! `.tmp` sibling before being renamed into place, so readers on other
//! devices never observe a half-written store. An unreadable document is
//! never overwritten: [`StoreFile::load`] fails and the run stops.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StateStore;
use crate::error::ErrorCode;

/// Errors reading or writing the state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read state store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("state store {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write state store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize state store: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::StorageError,
            Self::Write { .. } | Self::Serialize(_) => ErrorCode::StoreWriteFailed,
        }
    }
}

/// Handle on the state store file of a shared folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] or [`StoreError::Parse`] when the file
    /// exists but cannot be used (including an empty file).
    pub fn load(&self) -> Result<StateStore, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state store yet");
                return Ok(StateStore::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist the store atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the temp file cannot be written or
    /// renamed.
    pub fn save(&self, store: &StateStore) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        store.serialize(&mut ser)?;
        buf.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, &buf).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!(
            path = %self.path.display(),
            movies = store.movies.len(),
            series = store.series.len(),
            "state store saved"
        );
        Ok(())
    }
}
