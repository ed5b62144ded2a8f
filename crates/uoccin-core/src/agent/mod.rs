//! Device agent: the writer side of a run.
//!
//! A run appends commands to its own diff log inside this device's inbox.
//! [`DeviceAgent::finish`] then:
//!
//! 1. does nothing if no command was recorded (the log was never created);
//! 2. reduces the log into the state store, saving it only if touched;
//! 3. copies the log into every sibling inbox (temp name, then rename);
//! 4. deletes the local log once step 2 and every copy of step 3 succeeded.
//!
//! Progress of steps 2 and 3 is kept in a [`DeliveryManifest`] next to the
//! log, so a log that could not reach every sibling is retried by
//! [`retry_pending`] on a later run without being reduced twice or copied
//! twice to the same sibling.

pub mod manifest;

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandError, Field, Kind};
use crate::config::SyncConfig;
use crate::diff_log::{self, DiffLogError, DiffLogName, DiffLogWriter};
use crate::error::ErrorCode;
use crate::layout::DeviceId;
use crate::reduce::reduce;
use crate::store::file::{StoreError, StoreFile};

pub use manifest::{DeliveryManifest, MANIFEST_SUFFIX};

/// Errors that stop a run of the device agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to prepare inbox {path}: {source}")]
    Inbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Log(#[from] DiffLogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write delivery manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AgentError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Inbox { .. } | Self::Manifest { .. } => ErrorCode::DiffLogWriteFailed,
            Self::Command(e) => e.code(),
            Self::Log(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }
}

/// A sibling that did not receive the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub device: DeviceId,
    pub error: String,
    /// Always the `DeliveryFailed` code; carried for JSON consumers.
    pub error_code: &'static str,
}

impl DeliveryFailure {
    fn new(device: DeviceId, error: &impl std::fmt::Display) -> Self {
        Self {
            device,
            error: error.to_string(),
            error_code: ErrorCode::DeliveryFailed.code(),
        }
    }
}

/// What [`DeviceAgent::finish`] did with one log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinishReport {
    pub log: PathBuf,
    /// Commands read from the log when it was reduced by this call.
    pub commands: usize,
    /// The log was reduced by this call (not by an earlier run).
    pub reduced_now: bool,
    /// The state store was rewritten.
    pub store_touched: bool,
    pub corrupt_lines: usize,
    pub invalid_lines: usize,
    pub rejected: usize,
    /// Siblings that received the log in this call.
    pub delivered: Vec<DeviceId>,
    pub failed: Vec<DeliveryFailure>,
    /// The local log and its manifest are gone.
    pub removed: bool,
}

impl FinishReport {
    fn untouched(log: &Path) -> Self {
        Self {
            log: log.to_path_buf(),
            ..Self::default()
        }
    }

    /// The log still waits for at least one sibling.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// One run of this device.
#[derive(Debug)]
pub struct DeviceAgent {
    config: SyncConfig,
    log: DiffLogWriter,
    siblings: Vec<DeviceId>,
}

impl DeviceAgent {
    /// Prepare a run: create the inbox, pick the log name, find siblings.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Inbox`] if the inbox cannot be created or the
    /// shared folder cannot be listed.
    pub fn start(config: SyncConfig) -> Result<Self, AgentError> {
        let inbox = config
            .folder
            .ensure_inbox(&config.device)
            .map_err(|source| AgentError::Inbox {
                path: config.folder.inbox_dir(&config.device),
                source,
            })?;

        let mut name = DiffLogName::new(Utc::now().timestamp_millis(), config.device.clone());
        while inbox.join(name.file_name()).exists() {
            name.timestamp_ms += 1;
        }
        let path = inbox.join(name.file_name());

        let siblings = config
            .folder
            .siblings(&config.device)
            .map_err(|source| AgentError::Inbox {
                path: config.folder.root().to_path_buf(),
                source,
            })?;
        debug!(log = %path.display(), siblings = siblings.len(), "device run started");

        Ok(Self {
            config,
            log: DiffLogWriter::open(path),
            siblings,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Path of this run's diff log (may not exist yet).
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Sibling devices discovered at start.
    #[must_use]
    pub fn siblings(&self) -> &[DeviceId] {
        &self.siblings
    }

    /// Number of commands recorded so far.
    #[must_use]
    pub const fn recorded(&self) -> usize {
        self.log.appended()
    }

    /// Append one command stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Log`] if the command cannot be written.
    pub fn record(
        &mut self,
        kind: Kind,
        target: &str,
        field: Field,
        value: &str,
    ) -> Result<Command, AgentError> {
        let command = self.log.append(kind, target, field, value)?;
        debug!(
            ts = command.timestamp_ms,
            kind = %kind,
            target,
            field = %field,
            "recorded command"
        );
        Ok(command)
    }

    /// Record a boolean flag (`watchlist`, `collected`, `watched`).
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotAFlag`] for non-flag fields, otherwise
    /// the errors of [`Self::record`].
    pub fn record_flag(
        &mut self,
        kind: Kind,
        target: &str,
        field: Field,
        desired: bool,
    ) -> Result<Command, AgentError> {
        if !field.is_flag() {
            return Err(CommandError::NotAFlag(field).into());
        }
        self.record(kind, target, field, if desired { "true" } else { "false" })
    }

    /// Set or clear a flag together with its details.
    ///
    /// Adding to the watchlist also records `details` as tags; adding to
    /// the collection also records them as subtitles. Details are ignored
    /// when clearing a flag or when empty.
    ///
    /// # Errors
    ///
    /// Same as [`Self::record_flag`].
    pub fn mark(
        &mut self,
        kind: Kind,
        target: &str,
        field: Field,
        desired: bool,
        details: &[String],
    ) -> Result<Vec<Command>, AgentError> {
        let mut out = vec![self.record_flag(kind, target, field, desired)?];
        let detail_field = match field {
            Field::Watchlist => Some(Field::Tags),
            Field::Collected => Some(Field::Subtitles),
            _ => None,
        };
        if desired
            && !details.is_empty()
            && let Some(detail_field) = detail_field
        {
            let sep = self.config.format.list_separator.to_string();
            let value = details.join(sep.as_str());
            out.push(self.record(kind, target, detail_field, &value)?);
        }
        Ok(out)
    }

    /// Reduce, deliver and clean up this run's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or the state store cannot
    /// be loaded or saved. The log is kept in that case. Failed deliveries
    /// are not errors; they are listed in [`FinishReport::failed`].
    pub fn finish(self) -> Result<FinishReport, AgentError> {
        finish_log(&self.config, self.log.path(), &self.siblings)
    }
}

/// Finish every own log still sitting in this device's inbox.
///
/// Siblings are discovered afresh, so devices that joined since the log
/// was written receive it too. Manifests whose log is gone are removed.
///
/// # Errors
///
/// Stops at the first log that cannot be finished.
pub fn retry_pending(config: &SyncConfig) -> Result<Vec<FinishReport>, AgentError> {
    let inbox = config.folder.inbox_dir(&config.device);
    let inbox_err = |source| AgentError::Inbox {
        path: inbox.clone(),
        source,
    };
    let entries = match fs::read_dir(&inbox) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(inbox_err(e)),
    };

    let mut own = Vec::new();
    let mut manifests = Vec::new();
    for entry in entries {
        let path = entry.map_err(inbox_err)?.path();
        if let Some(name) = DiffLogName::from_path(&path) {
            if name.device == config.device {
                own.push((name, path));
            }
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
        {
            manifests.push(path);
        }
    }
    own.sort();

    for manifest in manifests {
        let log = manifest.with_extension("");
        if !log.exists() {
            debug!(manifest = %manifest.display(), "removing orphan manifest");
            let _ = fs::remove_file(&manifest);
        }
    }

    if own.is_empty() {
        return Ok(Vec::new());
    }
    let siblings = config
        .folder
        .siblings(&config.device)
        .map_err(|source| AgentError::Inbox {
            path: config.folder.root().to_path_buf(),
            source,
        })?;

    let mut reports = Vec::with_capacity(own.len());
    for (_, path) in own {
        info!(log = %path.display(), "retrying pending log");
        reports.push(finish_log(config, &path, &siblings)?);
    }
    Ok(reports)
}

fn load_manifest(path: &Path, log_name: &str) -> DeliveryManifest {
    match DeliveryManifest::load(path) {
        Ok(None) => DeliveryManifest::new(log_name),
        Ok(Some(Ok(manifest))) => manifest,
        Ok(Some(Err(_))) | Err(_) => {
            // A manifest only exists after the local reduce, so an unusable
            // one still means "reduced"; deliveries are redone.
            warn!(manifest = %path.display(), "unreadable delivery manifest; redelivering to all siblings");
            DeliveryManifest {
                log: log_name.to_string(),
                reduced: true,
                delivered: BTreeSet::new(),
            }
        }
    }
}

fn finish_log(
    config: &SyncConfig,
    log_path: &Path,
    siblings: &[DeviceId],
) -> Result<FinishReport, AgentError> {
    let mut report = FinishReport::untouched(log_path);
    if !log_path.exists() {
        debug!(log = %log_path.display(), "nothing recorded; nothing to finish");
        return Ok(report);
    }

    let log_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let manifest_path = DeliveryManifest::path_for(log_path);
    let mut manifest = load_manifest(&manifest_path, &log_name);
    let save_manifest = |m: &DeliveryManifest| {
        m.save(&manifest_path).map_err(|source| AgentError::Manifest {
            path: manifest_path.clone(),
            source,
        })
    };

    if !manifest.reduced {
        let read = diff_log::read_all(log_path)?;
        let store_file = StoreFile::new(config.folder.store_path());
        let store = store_file.load()?;
        let reduction = reduce(store, &read.commands, &config.format);
        if reduction.touched() {
            store_file.save(&reduction.store)?;
        }
        report.commands = read.commands.len();
        report.corrupt_lines = read.corrupt_lines;
        report.invalid_lines = read.invalid_lines;
        report.rejected = reduction.rejected.len();
        report.reduced_now = true;
        report.store_touched = reduction.touched();
        info!(
            log = %log_name,
            commands = report.commands,
            touched = report.store_touched,
            "reduced own log"
        );

        manifest.reduced = true;
        save_manifest(&manifest)?;
    }

    for sibling in siblings {
        if manifest.delivered.contains(sibling) {
            continue;
        }
        match deliver(log_path, &config.folder.inbox_dir(sibling)) {
            Ok(()) => {
                info!(log = %log_name, device = %sibling, "delivered log");
                manifest.delivered.insert(sibling.clone());
                report.delivered.push(sibling.clone());
            }
            Err(e) => {
                warn!(log = %log_name, device = %sibling, error = %e, "delivery failed; will retry");
                report.failed.push(DeliveryFailure::new(sibling.clone(), &e));
            }
        }
    }

    if report.failed.is_empty() {
        match fs::remove_file(log_path) {
            Ok(()) => {
                let _ = fs::remove_file(&manifest_path);
                report.removed = true;
                debug!(log = %log_name, "log finished and removed");
                return Ok(report);
            }
            Err(e) => warn!(log = %log_name, error = %e, "failed to remove finished log"),
        }
    }
    save_manifest(&manifest)?;
    Ok(report)
}

/// Copy `log_path` into `inbox` under a temp name, then rename into place.
fn deliver(log_path: &Path, inbox: &Path) -> io::Result<()> {
    let name = log_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    let tmp = inbox.join(tmp_name);

    if let Err(e) = fs::copy(log_path, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, inbox.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use tempfile::TempDir;

    fn dev(id: &str) -> DeviceId {
        DeviceId::new(id).expect("valid id")
    }

    fn config(dir: &TempDir, id: &str) -> SyncConfig {
        SyncConfig::new(dir.path(), dev(id))
    }

    fn load_store(dir: &TempDir) -> StateStore {
        StoreFile::new(dir.path().join("uoccin.json"))
            .load()
            .expect("load store")
    }

    #[test]
    fn start_creates_inbox_and_finds_siblings() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("device.nas")).expect("mkdir");
        let agent = DeviceAgent::start(config(&dir, "laptop")).expect("start");
        assert!(dir.path().join("device.laptop").is_dir());
        assert_eq!(agent.siblings(), [dev("nas")]);
        assert!(!agent.log_path().exists());
        let name = DiffLogName::from_path(agent.log_path()).expect("log name");
        assert_eq!(name.device, dev("laptop"));
    }

    #[test]
    fn finish_without_records_is_a_noop() {
        let dir = TempDir::new().expect("tempdir");
        let agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        let report = agent.finish().expect("finish");
        assert!(!report.reduced_now && !report.removed);
        assert!(!dir.path().join("uoccin.json").exists());
    }

    #[test]
    fn finish_reduces_delivers_and_removes() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("device.b")).expect("mkdir");
        let mut agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        agent
            .record_flag(Kind::Movie, "tt1", Field::Watchlist, true)
            .expect("record");
        let log = agent.log_path().to_path_buf();
        let name = log.file_name().expect("name").to_owned();

        let report = agent.finish().expect("finish");
        assert!(report.reduced_now && report.store_touched && report.removed);
        assert_eq!(report.delivered, [dev("b")]);
        assert!(!log.exists());
        assert!(!DeliveryManifest::path_for(&log).exists());
        assert!(dir.path().join("device.b").join(&name).exists());
        assert!(load_store(&dir).movie("tt1").expect("movie").watchlist);
    }

    #[test]
    fn record_flag_rejects_attribute_fields() {
        let dir = TempDir::new().expect("tempdir");
        let mut agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        let err = agent
            .record_flag(Kind::Movie, "tt1", Field::Rating, true)
            .expect_err("not a flag");
        assert_eq!(err.code(), ErrorCode::InvalidCommand);
        assert_eq!(agent.recorded(), 0);
    }

    #[test]
    fn mark_records_details_only_when_adding() {
        let dir = TempDir::new().expect("tempdir");
        let mut agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        let details = vec!["drama".to_string(), "classic".to_string()];

        let added = agent
            .mark(Kind::Movie, "tt1", Field::Watchlist, true, &details)
            .expect("mark");
        assert_eq!(added.len(), 2);
        assert_eq!(added[1].field, Field::Tags);
        assert_eq!(added[1].value, "drama,classic");

        let removed = agent
            .mark(Kind::Movie, "tt1", Field::Watchlist, false, &details)
            .expect("unmark");
        assert_eq!(removed.len(), 1);

        let watched = agent
            .mark(Kind::Movie, "tt1", Field::Watched, true, &details)
            .expect("mark");
        assert_eq!(watched.len(), 1);
    }

    #[test]
    fn mark_collected_records_subtitles_for_episode() {
        let dir = TempDir::new().expect("tempdir");
        let mut agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        agent
            .mark(
                Kind::Series,
                "500.1.2",
                Field::Collected,
                true,
                &["eng".to_string(), "ita".to_string()],
            )
            .expect("mark");
        agent.finish().expect("finish");
        let store = load_store(&dir);
        assert_eq!(store.series("500").expect("series").collected[&1][&2], ["eng", "ita"]);
    }

    #[test]
    fn unreadable_store_keeps_log() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("uoccin.json"), "not json").expect("write");
        let mut agent = DeviceAgent::start(config(&dir, "a")).expect("start");
        agent
            .record_flag(Kind::Movie, "tt1", Field::Watched, true)
            .expect("record");
        let log = agent.log_path().to_path_buf();

        let err = agent.finish().expect_err("store unreadable");
        assert_eq!(err.code(), ErrorCode::StorageError);
        assert!(log.exists());
        assert!(!DeliveryManifest::path_for(&log).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("uoccin.json")).expect("read"),
            "not json"
        );
    }

    #[test]
    fn retry_pending_finishes_leftover_logs() {
        let dir = TempDir::new().expect("tempdir");
        let cfg = config(&dir, "a");
        let mut agent = DeviceAgent::start(cfg.clone()).expect("start");
        agent
            .record_flag(Kind::Movie, "tt1", Field::Collected, true)
            .expect("record");
        // Simulate a run that died before finishing.
        let log = agent.log_path().to_path_buf();
        drop(agent);

        fs::create_dir(dir.path().join("device.b")).expect("mkdir");
        let reports = retry_pending(&cfg).expect("retry");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].reduced_now && reports[0].removed);
        assert_eq!(reports[0].delivered, [dev("b")]);
        assert!(!log.exists());
        assert!(load_store(&dir).movie("tt1").is_some());
    }

    #[test]
    fn retry_skips_reduce_when_manifest_says_reduced() {
        let dir = TempDir::new().expect("tempdir");
        let cfg = config(&dir, "a");
        let inbox = cfg.folder.ensure_inbox(&cfg.device).expect("inbox");
        let log = inbox.join("100.a.diff");
        fs::write(&log, "100|movie|tt1|watched|true\n").expect("write");
        let manifest = DeliveryManifest {
            log: "100.a.diff".into(),
            reduced: true,
            delivered: BTreeSet::new(),
        };
        manifest
            .save(&DeliveryManifest::path_for(&log))
            .expect("save manifest");

        let reports = retry_pending(&cfg).expect("retry");
        assert!(!reports[0].reduced_now);
        assert!(reports[0].removed);
        assert!(load_store(&dir).is_empty());
    }

    #[test]
    fn retry_ignores_foreign_logs_and_removes_orphan_manifests() {
        let dir = TempDir::new().expect("tempdir");
        let cfg = config(&dir, "a");
        let inbox = cfg.folder.ensure_inbox(&cfg.device).expect("inbox");
        fs::write(inbox.join("100.b.diff"), "100|movie|tt1|watched|true\n").expect("write");
        fs::write(inbox.join("50.a.diff.manifest"), "log: 50.a.diff\n").expect("write");

        assert!(retry_pending(&cfg).expect("retry").is_empty());
        assert!(inbox.join("100.b.diff").exists());
        assert!(!inbox.join("50.a.diff.manifest").exists());
    }

    #[test]
    fn deliver_leaves_no_temp_file() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("1.a.diff");
        fs::write(&src, "x\n").expect("write");
        let inbox = dir.path().join("device.b");
        fs::create_dir(&inbox).expect("mkdir");

        deliver(&src, &inbox).expect("deliver");
        let names: Vec<String> = fs::read_dir(&inbox)
            .expect("list")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["1.a.diff"]);
    }
}
