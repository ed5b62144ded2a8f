//! Diff line writer.
//!
//! Serializes [`Command`]s to the `|`-separated line format:
//!
//! ```text
//! {timestamp_ms}|{kind}|{target}|{field}|{value}\n
//! ```
//!
//! Guarantees the one-line invariant (no `\n`/`\r` in any field) and that
//! the first four fields contain no `|`, so the parser can always split the
//! line back into exactly five fields.

use super::Command;
use super::parser::LOG_HEADER;

/// The field-description comment line written after the header.
pub const FIELD_COMMENT: &str = "# fields: timestamp_ms|kind|target|field|value";

/// Errors that can occur while serializing a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// A field contained a literal newline or carriage return.
    #[error("{0} contains a line break; one-line invariant violated")]
    LineBreak(&'static str),

    /// The target contained the `|` field separator.
    #[error("target contains '|' which is reserved as the field separator")]
    SeparatorInTarget,
}

/// Return the header block written at the top of every new diff log.
#[must_use]
pub fn log_header() -> String {
    format!("{LOG_HEADER}\n{FIELD_COMMENT}\n")
}

/// Serialize a command to a single line (without trailing newline).
///
/// # Errors
///
/// Returns [`WriteError`] if the target or value would break the line
/// format.
pub fn to_line(command: &Command) -> Result<String, WriteError> {
    if has_line_break(&command.target) {
        return Err(WriteError::LineBreak("target"));
    }
    if has_line_break(&command.value) {
        return Err(WriteError::LineBreak("value"));
    }
    if command.target.contains('|') {
        return Err(WriteError::SeparatorInTarget);
    }

    Ok(format!(
        "{}|{}|{}|{}|{}",
        command.timestamp_ms, command.kind, command.target, command.field, command.value
    ))
}

/// Serialize a command to a line with trailing newline.
///
/// # Errors
///
/// Same as [`to_line`].
pub fn write_line(command: &Command) -> Result<String, WriteError> {
    let mut line = to_line(command)?;
    line.push('\n');
    Ok(line)
}

fn has_line_break(s: &str) -> bool {
    s.contains('\n') || s.contains('\r')
}
