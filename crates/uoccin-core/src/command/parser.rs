//! Diff line parser.
//!
//! # Format (v1)
//!
//! ```text
//! timestamp_ms|kind|target|field|value
//! ```
//!
//! - Comment lines start with `#` (or `;`, which older writers used for
//!   debug lines) and are returned as [`ParsedLine::Comment`].
//! - Blank/whitespace-only lines are returned as [`ParsedLine::Blank`].
//! - Data lines are split on the first four `|`; the value keeps any
//!   further `|` characters.
//!
//! Structural failures (field count, timestamp) are corrupt lines. Lines that
//! split cleanly but name an unknown kind or field are invalid commands.
//! Both are reported through [`ParseError`] and the caller decides to skip.

use super::{Command, CommandError, Field, Kind};
use crate::error::ErrorCode;

/// The header line written at the top of every diff log.
pub const LOG_HEADER: &str = "# uoccin diff v1";

/// The diff log format version understood by this build.
pub const CURRENT_VERSION: u32 = 1;

/// The header prefix for detecting format version.
pub const HEADER_PREFIX: &str = "# uoccin diff v";

const FIELD_COUNT: usize = 5;

/// Errors that can occur while parsing a diff line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Line has fewer than five `|`-separated fields.
    #[error("expected {expected} '|'-separated fields, found {found}")]
    FieldCount {
        /// Number of fields found.
        found: usize,
        /// Expected number of fields.
        expected: usize,
    },

    /// The timestamp is not a valid i64.
    #[error("invalid timestamp_ms (not i64): '{0}'")]
    InvalidTimestamp(String),

    /// The final line has no terminating newline: an interrupted append.
    #[error("incomplete final line (no trailing newline)")]
    TornLine,

    /// The line is structurally fine but the command is not.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The log was written by a newer version of uoccin.
    #[error("diff log version mismatch: {0}")]
    VersionMismatch(String),
}

impl ParseError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::FieldCount { .. } | Self::InvalidTimestamp(_) | Self::TornLine => {
                ErrorCode::CorruptLog
            }
            Self::Command(_) => ErrorCode::InvalidCommand,
            Self::VersionMismatch(_) => ErrorCode::UnsupportedLogVersion,
        }
    }

    /// `true` for structural damage, `false` for semantically invalid lines.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self.code(), ErrorCode::CorruptLog)
    }
}

/// The result of parsing a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A comment line. The text includes the comment prefix.
    Comment(String),
    /// A blank or whitespace-only line.
    Blank,
    /// A parsed command.
    Command(Command),
}

/// Detect the diff log format version from a header line.
///
/// # Errors
///
/// Returns an actionable message if the header is malformed or names a
/// version newer than [`CURRENT_VERSION`].
pub fn detect_version(header_line: &str) -> Result<u32, String> {
    let line = header_line.trim();
    let Some(version_str) = line.strip_prefix(HEADER_PREFIX) else {
        return Err(format!(
            "invalid diff log header: expected '{HEADER_PREFIX}N', got '{line}'"
        ));
    };
    let version: u32 = version_str.parse().map_err(|_| {
        format!("invalid version number '{version_str}' in diff log header")
    })?;
    if version > CURRENT_VERSION {
        return Err(format!(
            "diff log version {version} is newer than this version of uoccin \
             (supports up to v{CURRENT_VERSION}); upgrade uoccin on this device"
        ));
    }
    Ok(version)
}

/// Parse one diff line.
///
/// # Errors
///
/// Returns [`ParseError`] with a specific variant for each failure.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');

    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return Ok(ParsedLine::Comment(trimmed.to_string()));
    }

    if trimmed.trim().is_empty() {
        return Ok(ParsedLine::Blank);
    }

    let fields: Vec<&str> = trimmed.splitn(FIELD_COUNT, '|').collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount {
            found: fields.len(),
            expected: FIELD_COUNT,
        });
    }

    let timestamp_ms: i64 = fields[0]
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidTimestamp(fields[0].to_string()))?;
    let kind: Kind = fields[1].trim().parse()?;
    let target = fields[2].trim();
    if target.is_empty() {
        return Err(CommandError::EmptyTarget.into());
    }
    let field: Field = fields[3].trim().parse()?;

    Ok(ParsedLine::Command(Command {
        timestamp_ms,
        kind,
        target: target.to_string(),
        field,
        value: fields[4].to_string(),
    }))
}
