//! Inbox scanner: the reader side of a run.
//!
//! Other devices drop their diff logs into this device's inbox. [`scan`]
//! reads every foreign log, [`Inbox::apply`] reduces all of their commands
//! in one timestamp-ordered pass and deletes the logs once the state store
//! is safely persisted.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::command::Command;
use crate::config::{FormatConfig, SyncConfig};
use crate::diff_log::{self, DiffLogName};
use crate::reduce::reduce;
use crate::store::file::StoreFile;
use crate::sync::SyncError;

/// A foreign log left in place because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptLog {
    pub path: PathBuf,
    pub reason: String,
}

/// Foreign logs found in this device's inbox.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    /// Readable logs, in file-name order.
    pub logs: Vec<PathBuf>,
    pub kept: Vec<KeptLog>,
    pub commands: Vec<Command>,
    pub corrupt_lines: usize,
    pub invalid_lines: usize,
}

/// What [`Inbox::apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub consumed: Vec<PathBuf>,
    pub kept: Vec<KeptLog>,
    pub commands: usize,
    pub rejected: usize,
    pub corrupt_lines: usize,
    pub invalid_lines: usize,
    pub touched_movies: bool,
    pub touched_series: bool,
}

impl ApplyReport {
    #[must_use]
    pub const fn store_touched(&self) -> bool {
        self.touched_movies || self.touched_series
    }
}

/// Read every foreign log in this device's inbox.
///
/// Own logs, temp copies, manifests and unrelated files are skipped. A
/// missing inbox is an empty one.
///
/// # Errors
///
/// Returns [`SyncError::Inbox`] if the inbox cannot be listed.
pub fn scan(config: &SyncConfig) -> Result<Inbox, SyncError> {
    let dir = config.folder.inbox_dir(&config.device);
    let inbox_err = |source| SyncError::Inbox {
        path: dir.clone(),
        source,
    };
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Inbox::default()),
        Err(e) => return Err(inbox_err(e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(inbox_err)?.path();
        if let Some(name) = DiffLogName::from_path(&path)
            && name.device != config.device
            && path.is_file()
        {
            found.push((name, path));
        }
    }
    found.sort();

    let mut inbox = Inbox::default();
    for (name, path) in found {
        match diff_log::read_all(&path) {
            Ok(read) => {
                info!(log = %name, from = %name.device, commands = read.commands.len(), "found foreign log");
                inbox.commands.extend(read.commands);
                inbox.corrupt_lines += read.corrupt_lines;
                inbox.invalid_lines += read.invalid_lines;
                inbox.logs.push(path);
            }
            Err(e) => {
                warn!(log = %name, error = %e, "keeping unreadable log");
                inbox.kept.push(KeptLog {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(inbox)
}

impl Inbox {
    /// Whether there is nothing to consume.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Reduce the accumulated commands, persist, then delete consumed logs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the store cannot be loaded or saved.
    /// No log is deleted in that case.
    pub fn apply(self, store: &StoreFile, format: &FormatConfig) -> Result<ApplyReport, SyncError> {
        let mut report = ApplyReport {
            kept: self.kept,
            commands: self.commands.len(),
            corrupt_lines: self.corrupt_lines,
            invalid_lines: self.invalid_lines,
            ..ApplyReport::default()
        };
        if self.logs.is_empty() {
            return Ok(report);
        }

        if !self.commands.is_empty() {
            let reduction = reduce(store.load()?, &self.commands, format);
            if reduction.touched() {
                store.save(&reduction.store)?;
            }
            report.rejected = reduction.rejected.len();
            report.touched_movies = reduction.touched_movies;
            report.touched_series = reduction.touched_series;
        }

        for path in self.logs {
            match fs::remove_file(&path) {
                Ok(()) => report.consumed.push(path),
                Err(e) => warn!(log = %path.display(), error = %e, "failed to remove consumed log"),
            }
        }
        info!(
            consumed = report.consumed.len(),
            commands = report.commands,
            touched = report.store_touched(),
            "applied inbox"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DeviceId;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SyncConfig, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let cfg = SyncConfig::new(dir.path(), DeviceId::new("me").expect("id"));
        let inbox = cfg.folder.ensure_inbox(&cfg.device).expect("inbox");
        (dir, cfg, inbox)
    }

    fn store_of(cfg: &SyncConfig) -> StoreFile {
        StoreFile::new(cfg.folder.store_path())
    }

    #[test]
    fn missing_inbox_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let cfg = SyncConfig::new(dir.path(), DeviceId::new("me").expect("id"));
        assert!(scan(&cfg).expect("scan").is_empty());
    }

    #[test]
    fn scan_reads_foreign_logs_in_name_order_and_skips_the_rest() {
        let (_dir, cfg, inbox) = setup();
        fs::write(inbox.join("200.b.diff"), "200|movie|tt2|watched|true\n").expect("write");
        fs::write(inbox.join("100.c.diff"), "100|movie|tt1|watched|true\n").expect("write");
        fs::write(inbox.join("150.me.diff"), "150|movie|tt3|watched|true\n").expect("write");
        fs::write(inbox.join(".300.b.diff.tmp"), "300|movie|tt4|watched|true\n").expect("write");
        fs::write(inbox.join("notes.txt"), "hello").expect("write");

        let found = scan(&cfg).expect("scan");
        let targets: Vec<&str> = found.commands.iter().map(|c| c.target.as_str()).collect();
        assert_eq!(targets, ["tt1", "tt2"]);
        assert_eq!(found.logs.len(), 2);
    }

    #[test]
    fn apply_reduces_persists_and_deletes() {
        let (_dir, cfg, inbox) = setup();
        fs::write(
            inbox.join("100.b.diff"),
            "100|series|500.1.2|collected|true\n150|series|500.1.2|subtitles|eng,ita\n",
        )
        .expect("write");

        let report = scan(&cfg)
            .expect("scan")
            .apply(&store_of(&cfg), &cfg.format)
            .expect("apply");
        assert!(report.touched_series && !report.touched_movies);
        assert_eq!(report.consumed.len(), 1);
        assert!(!inbox.join("100.b.diff").exists());

        let store = store_of(&cfg).load().expect("load");
        assert_eq!(store.series("500").expect("series").collected[&1][&2], ["eng", "ita"]);
    }

    #[test]
    fn commands_are_ordered_across_logs() {
        let (_dir, cfg, inbox) = setup();
        fs::write(inbox.join("100.b.diff"), "300|movie|tt1|watchlist|false\n").expect("write");
        fs::write(inbox.join("200.c.diff"), "200|movie|tt1|watchlist|true\n").expect("write");

        scan(&cfg)
            .expect("scan")
            .apply(&store_of(&cfg), &cfg.format)
            .expect("apply");
        assert!(store_of(&cfg).load().expect("load").movie("tt1").is_none());
    }

    #[test]
    fn newer_version_log_is_kept() {
        let (_dir, cfg, inbox) = setup();
        fs::write(inbox.join("100.b.diff"), "# uoccin diff v7\n100|movie|tt1|watched|true\n")
            .expect("write");

        let report = scan(&cfg)
            .expect("scan")
            .apply(&store_of(&cfg), &cfg.format)
            .expect("apply");
        assert_eq!(report.kept.len(), 1);
        assert!(report.consumed.is_empty());
        assert!(inbox.join("100.b.diff").exists());
        assert!(!cfg.folder.store_path().exists());
    }

    #[test]
    fn corrupt_store_keeps_every_log() {
        let (_dir, cfg, inbox) = setup();
        fs::write(cfg.folder.store_path(), "{").expect("write");
        fs::write(inbox.join("100.b.diff"), "100|movie|tt1|watched|true\n").expect("write");

        let err = scan(&cfg)
            .expect("scan")
            .apply(&store_of(&cfg), &cfg.format)
            .expect_err("store unreadable");
        assert!(matches!(err, SyncError::Store(_)));
        assert!(inbox.join("100.b.diff").exists());
    }

    #[test]
    fn log_with_only_bad_lines_is_consumed_without_touching_store() {
        let (_dir, cfg, inbox) = setup();
        fs::write(inbox.join("100.b.diff"), "garbage\n").expect("write");
        let report = scan(&cfg)
            .expect("scan")
            .apply(&store_of(&cfg), &cfg.format)
            .expect("apply");
        assert_eq!(report.corrupt_lines, 1);
        assert_eq!(report.consumed.len(), 1);
        assert!(!cfg.folder.store_path().exists());
    }
}
