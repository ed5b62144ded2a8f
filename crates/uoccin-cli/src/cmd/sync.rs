//! `uoccin sync`: retry pending deliveries, then apply the inbox.

use anyhow::{Context as _, Result};
use clap::Args;

use uoccin_core::sync::synchronize;

use super::{Globals, lock_device, write_finish};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct SyncArgs {}

/// Execute `uoccin sync`: retry undelivered own logs, then apply the inbox.
///
/// # Errors
///
/// Fails on config resolution, lock contention, or a store or inbox that
/// cannot be read or written. Logs are kept in every failure case.
pub fn run_sync(_args: &SyncArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let config = globals.sync_config()?;
    let _lock = lock_device(&config)?;
    let report = synchronize(&config)
        .with_context(|| format!("Sync failed for device '{}'", config.device))?;

    render(output, &report, |r, w| {
        for pending in &r.pending {
            writeln!(w, "retried {}", pending.log.display())?;
            write_finish(pending, w)?;
        }
        let inbox = &r.inbox;
        if inbox.consumed.is_empty() {
            writeln!(w, "✓ inbox empty")?;
        } else {
            writeln!(
                w,
                "✓ applied {} log(s), {} command(s)",
                inbox.consumed.len(),
                inbox.commands
            )?;
        }
        if inbox.rejected > 0 {
            writeln!(w, "  {} command(s) rejected by the reducer", inbox.rejected)?;
        }
        if inbox.corrupt_lines + inbox.invalid_lines > 0 {
            writeln!(
                w,
                "  skipped {} corrupt and {} invalid line(s)",
                inbox.corrupt_lines, inbox.invalid_lines
            )?;
        }
        for kept in &inbox.kept {
            writeln!(w, "  ! kept {}: {}", kept.path.display(), kept.reason)?;
        }
        Ok(())
    })
}
