//! Diff logs: one append-only file of commands per device run.
//!
//! # Layout
//!
//! ```text
//! <root>/device.<id>/<timestamp_ms>.<author>.diff
//! ```
//!
//! - Names sort by creation time and carry the authoring device, so a
//!   device can tell its own logs from foreign ones by parsing the name.
//! - The file is created lazily on the first append; a run that records
//!   nothing leaves nothing behind.
//! - Each append uses `O_APPEND` + `write_all` + `flush`.
//! - A final line without `\n` is a torn write. It is never parsed, only
//!   counted as corrupt, so a value cut short cannot be applied.

use chrono::Utc;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::command::parser::{HEADER_PREFIX, ParseError, ParsedLine, detect_version, parse_line};
use crate::command::writer::{WriteError, log_header, write_line};
use crate::command::{Command, Field, Kind};
use crate::error::ErrorCode;
use crate::layout::DeviceId;

/// File extension of diff logs.
pub const DIFF_EXTENSION: &str = "diff";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from reading or writing diff logs.
#[derive(Debug, thiserror::Error)]
pub enum DiffLogError {
    #[error("failed to read diff log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write diff log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to append: {0}")]
    Line(#[from] WriteError),

    #[error("diff log {path} is unreadable: {message}")]
    UnsupportedVersion { path: PathBuf, message: String },
}

impl DiffLogError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::CorruptLog,
            Self::Write { .. } => ErrorCode::DiffLogWriteFailed,
            Self::Line(_) => ErrorCode::InvalidCommand,
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedLogVersion,
        }
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Parsed `<timestamp_ms>.<device>.diff` file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiffLogName {
    pub timestamp_ms: i64,
    pub device: DeviceId,
}

impl DiffLogName {
    #[must_use]
    pub const fn new(timestamp_ms: i64, device: DeviceId) -> Self {
        Self {
            timestamp_ms,
            device,
        }
    }

    /// The file name for this log.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}.{DIFF_EXTENSION}", self.timestamp_ms, self.device)
    }

    /// Parse a file name. Returns `None` for anything that is not a diff
    /// log name (temp copies, manifests, lock files, ...).
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(DIFF_EXTENSION)?.strip_suffix('.')?;
        let (ts, device) = stem.split_once('.')?;
        if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            timestamp_ms: ts.parse().ok()?,
            device: DeviceId::new(device).ok()?,
        })
    }

    /// Parse the file name component of `path`.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()?.to_str().and_then(Self::parse)
    }
}

impl fmt::Display for DiffLogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append handle for one run's diff log.
#[derive(Debug)]
pub struct DiffLogWriter {
    path: PathBuf,
    last_ts: i64,
    appended: usize,
}

impl DiffLogWriter {
    /// Bind a writer to `path`. Nothing is created until the first append.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_ts: i64::MIN,
            appended: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of commands appended through this handle.
    #[must_use]
    pub const fn appended(&self) -> usize {
        self.appended
    }

    /// Current wall-clock milliseconds, never lower than the previous
    /// timestamp handed out by this writer.
    pub fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_ts = now.max(self.last_ts);
        self.last_ts
    }

    /// Stamp and append a command.
    ///
    /// # Errors
    ///
    /// Returns [`DiffLogError::Line`] if the target or value cannot be
    /// represented on one line, or [`DiffLogError::Write`] on I/O failure.
    pub fn append(
        &mut self,
        kind: Kind,
        target: &str,
        field: Field,
        value: &str,
    ) -> Result<Command, DiffLogError> {
        let command = Command::new(self.next_timestamp(), kind, target, field, value);
        self.append_command(&command)?;
        Ok(command)
    }

    /// Append an already stamped command.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append`].
    pub fn append_command(&mut self, command: &Command) -> Result<(), DiffLogError> {
        let line = write_line(command)?;
        let write_err = |source| DiffLogError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        let is_new = file.metadata().map_err(write_err)?.len() == 0;
        if is_new {
            file.write_all(log_header().as_bytes()).map_err(write_err)?;
            debug!(path = %self.path.display(), "created diff log");
        }
        file.write_all(line.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        self.last_ts = self.last_ts.max(command.timestamp_ms);
        self.appended += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Lazy line-by-line reader over a diff log.
///
/// Yields `(line_number, parse_result)` pairs, 1-based. A version header
/// newer than this build yields [`ParseError::VersionMismatch`] and ends
/// the iteration.
#[derive(Debug)]
pub struct LogLines {
    reader: BufReader<File>,
    line_no: usize,
    done: bool,
}

impl LogLines {
    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`DiffLogError::Read`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, DiffLogError> {
        let file = File::open(path).map_err(|source| DiffLogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            line_no: 0,
            done: false,
        })
    }
}

impl Iterator for LogLines {
    type Item = io::Result<(usize, Result<ParsedLine, ParseError>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.line_no += 1;

        // Every append ends with `\n`; a last line without one was cut short.
        if !buf.ends_with(b"\n") && !buf.iter().all(u8::is_ascii_whitespace) {
            self.done = true;
            return Some(Ok((self.line_no, Err(ParseError::TornLine))));
        }

        let text = String::from_utf8_lossy(&buf);
        let parsed = match parse_line(&text) {
            Ok(ParsedLine::Comment(comment)) if comment.starts_with(HEADER_PREFIX) => {
                match detect_version(&comment) {
                    Ok(_) => Ok(ParsedLine::Comment(comment)),
                    Err(message) => {
                        self.done = true;
                        Err(ParseError::VersionMismatch(message))
                    }
                }
            }
            other => other,
        };
        Some(Ok((self.line_no, parsed)))
    }
}

/// Everything usable in one diff log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub commands: Vec<Command>,
    /// Lines that did not split into a timestamped command.
    pub corrupt_lines: usize,
    /// Well-formed lines naming an unknown kind or field.
    pub invalid_lines: usize,
}

/// Read every command of a diff log, skipping and counting bad lines.
///
/// # Errors
///
/// Returns [`DiffLogError::Read`] when the file cannot be read and
/// [`DiffLogError::UnsupportedVersion`] when it was written by a newer
/// format version. In both cases the caller must keep the file.
pub fn read_all(path: &Path) -> Result<ReadOutcome, DiffLogError> {
    let mut out = ReadOutcome::default();
    for item in LogLines::open(path)? {
        let (line_no, parsed) = item.map_err(|source| DiffLogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match parsed {
            Ok(ParsedLine::Command(command)) => out.commands.push(command),
            Ok(ParsedLine::Comment(_) | ParsedLine::Blank) => {}
            Err(ParseError::VersionMismatch(message)) => {
                return Err(DiffLogError::UnsupportedVersion {
                    path: path.to_path_buf(),
                    message,
                });
            }
            Err(err) if err.is_corrupt() => {
                warn!(path = %path.display(), line = line_no, error = %err, "skipping corrupt line");
                out.corrupt_lines += 1;
            }
            Err(err) => {
                warn!(path = %path.display(), line = line_no, error = %err, "skipping invalid command");
                out.invalid_lines += 1;
            }
        }
    }
    info!(
        path = %path.display(),
        commands = out.commands.len(),
        corrupt = out.corrupt_lines,
        invalid = out.invalid_lines,
        "read diff log"
    );
    Ok(out)
}
