//! `uoccin init`: create this device's inbox.

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;

use super::{Globals, lock_device};
use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitOutput {
    device: String,
    root: String,
    inbox: String,
    siblings: Vec<String>,
}

/// Execute `uoccin init`: create this device's inbox in the shared folder.
///
/// ```text
/// <root>/
///   device.<id>/      (inbox; other devices deliver logs here)
/// ```
///
/// Running it again is harmless.
///
/// # Errors
///
/// Fails if the device cannot be resolved or the inbox cannot be created.
pub fn run_init(_args: &InitArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let config = globals.sync_config()?;
    let lock = lock_device(&config)?;
    let siblings = config
        .folder
        .siblings(&config.device)
        .with_context(|| format!("Failed to list devices in {}", config.folder.root().display()))?;
    drop(lock);

    let result = InitOutput {
        device: config.device.to_string(),
        root: config.folder.root().display().to_string(),
        inbox: config.folder.inbox_dir(&config.device).display().to_string(),
        siblings: siblings.iter().map(ToString::to_string).collect(),
    };

    render(output, &result, |r, w| {
        writeln!(w, "✓ Device '{}' is ready.", r.device)?;
        writeln!(w)?;
        pretty_kv(w, "Root", &r.root)?;
        pretty_kv(w, "Inbox", &r.inbox)?;
        if r.siblings.is_empty() {
            pretty_kv(w, "Siblings", "(none yet)")
        } else {
            pretty_kv(w, "Siblings", r.siblings.join(", "))
        }
    })
}
