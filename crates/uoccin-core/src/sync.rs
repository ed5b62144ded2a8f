//! One full synchronization pass for a device.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::info;

use crate::agent::{AgentError, FinishReport, retry_pending};
use crate::config::SyncConfig;
use crate::error::ErrorCode;
use crate::inbox::{ApplyReport, scan};
use crate::store::file::{StoreError, StoreFile};

/// Errors that stop a sync pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to list inbox {path}: {source}")]
    Inbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Inbox { .. } => ErrorCode::InternalUnexpected,
            Self::Agent(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }
}

/// Result of [`synchronize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Own logs from earlier runs that were finished again.
    pub pending: Vec<FinishReport>,
    pub inbox: ApplyReport,
}

/// Retry undelivered own logs, then consume the inbox.
///
/// # Errors
///
/// Propagates inbox listing, log and state store failures.
pub fn synchronize(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    config
        .folder
        .ensure_inbox(&config.device)
        .map_err(|source| SyncError::Inbox {
            path: config.folder.inbox_dir(&config.device),
            source,
        })?;

    let pending = retry_pending(config)?;
    let inbox = scan(config)?.apply(&StoreFile::new(config.folder.store_path()), &config.format)?;
    info!(
        device = %config.device,
        pending = pending.len(),
        consumed = inbox.consumed.len(),
        "sync complete"
    );
    Ok(SyncReport { pending, inbox })
}
