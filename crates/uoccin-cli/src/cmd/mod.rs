//! Subcommand handlers.
//!
//! Mutating commands hold the device run lock for their whole duration;
//! read-only commands only need the shared folder root.

pub mod init;
pub mod mark;
pub mod record;
pub mod show;
pub mod sync;
pub mod watchlist;

use anyhow::{Context as _, Result};
use std::path::PathBuf;

use uoccin_core::agent::{DeviceAgent, FinishReport};
use uoccin_core::command::Command;
use uoccin_core::config::{self, RealEnv, SyncConfig};
use uoccin_core::layout::{DeviceId, SharedFolder};
use uoccin_core::lock::{DEFAULT_LOCK_TIMEOUT, RunLock};
use uoccin_core::store::StateStore;
use uoccin_core::store::file::StoreFile;

/// Global flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub root: Option<PathBuf>,
    pub device: Option<String>,
}

impl Globals {
    /// Full device configuration for mutating commands.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        config::resolve_config(self.device.as_deref(), self.root.as_deref())
    }

    /// Shared folder only, for read-only commands.
    pub fn folder(&self) -> Result<SharedFolder> {
        let user = config::load_user_config()?;
        let root = config::resolve_root_with(self.root.as_deref(), &RealEnv, &user)?;
        Ok(SharedFolder::new(root))
    }

    /// Load the state store of the resolved folder.
    pub fn load_store(&self) -> Result<StateStore> {
        let folder = self.folder()?;
        StoreFile::new(folder.store_path())
            .load()
            .with_context(|| format!("Failed to load state store under {}", folder.root().display()))
    }
}

/// Take the run lock of the configured device, creating its inbox first.
pub fn lock_device(config: &SyncConfig) -> Result<RunLock> {
    let inbox = config
        .folder
        .ensure_inbox(&config.device)
        .with_context(|| format!("Failed to create inbox for device '{}'", config.device))?;
    RunLock::acquire(&config.folder.lock_path(&config.device), DEFAULT_LOCK_TIMEOUT)
        .with_context(|| format!("Failed to lock {}", inbox.display()))
}

/// Commands written by one run and what finishing it did.
#[derive(Debug, serde::Serialize)]
pub struct RunOutcome {
    pub device: String,
    pub commands: Vec<Command>,
    pub finish: FinishReport,
}

/// Run `body` inside one locked device run, then finish the run.
///
/// A failure inside `body` drops the run unfinished; its log is picked up
/// by the next `uoccin sync`.
pub fn with_run(
    config: SyncConfig,
    body: impl FnOnce(&mut DeviceAgent) -> Result<Vec<Command>>,
) -> Result<RunOutcome> {
    let _lock = lock_device(&config)?;
    let device = config.device.to_string();
    let mut agent = DeviceAgent::start(config).context("Failed to start device run")?;
    let commands = body(&mut agent)?;
    let finish = agent.finish().context("Failed to finish device run")?;
    Ok(RunOutcome {
        device,
        commands,
        finish,
    })
}

/// Human summary of a finished run, shared by `record`, `mark` and `unmark`.
pub fn write_outcome(outcome: &RunOutcome, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    writeln!(
        w,
        "✓ {} command(s) recorded on {}",
        outcome.commands.len(),
        outcome.device
    )?;
    write_finish(&outcome.finish, w)
}

/// Human summary of one [`FinishReport`].
pub fn write_finish(report: &FinishReport, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    if report.rejected > 0 {
        writeln!(w, "  {} command(s) rejected by the reducer", report.rejected)?;
    }
    if !report.delivered.is_empty() {
        let names: Vec<&str> = report.delivered.iter().map(DeviceId::as_str).collect();
        writeln!(w, "  delivered to: {}", names.join(", "))?;
    }
    for failure in &report.failed {
        writeln!(
            w,
            "  ! [{}] not delivered to {}: {}",
            failure.error_code, failure.device, failure.error
        )?;
    }
    if report.is_pending() {
        writeln!(w, "  log kept at {}; run `uoccin sync` to retry", report.log.display())?;
    }
    Ok(())
}
