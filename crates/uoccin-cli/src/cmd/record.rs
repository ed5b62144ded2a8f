//! `uoccin record`: append raw commands in one run.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::io::{self, BufRead};

use uoccin_core::command::{Field, Kind};

use super::{Globals, with_run, write_outcome};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Record kind: movie or series.
    #[arg(required_unless_present = "stdin")]
    pub kind: Option<Kind>,

    /// Movie id, series id or `<series>.<season>.<episode>`.
    #[arg(required_unless_present = "stdin")]
    pub target: Option<String>,

    /// Field: watchlist, collected, watched, tags, subtitles or rating.
    #[arg(required_unless_present = "stdin")]
    pub field: Option<Field>,

    /// Field value. Flags take true/false; lists are separator-joined.
    #[arg(required_unless_present = "stdin", allow_hyphen_values = true)]
    pub value: Option<String>,

    /// Read `kind|target|field|value` lines from stdin instead.
    #[arg(long, conflicts_with_all = ["kind", "target", "field", "value"])]
    pub stdin: bool,
}

/// A command as entered by the user, before it gets a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    kind: Kind,
    target: String,
    field: Field,
    value: String,
}

/// Parse `kind|target|field|value` lines. Blank lines and `#` comments are
/// skipped.
fn parse_entries(input: impl BufRead) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read stdin line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = trimmed.splitn(4, '|').collect();
        let [kind, target, field, value] = parts.as_slice() else {
            bail!(
                "line {line_no}: expected kind|target|field|value, found {} field(s)",
                parts.len()
            );
        };
        entries.push(Entry {
            kind: kind
                .parse()
                .with_context(|| format!("line {line_no}: bad kind"))?,
            target: (*target).to_string(),
            field: field
                .parse()
                .with_context(|| format!("line {line_no}: bad field"))?,
            value: (*value).to_string(),
        });
    }
    Ok(entries)
}

fn collect_entries(args: &RecordArgs) -> Result<Vec<Entry>> {
    if args.stdin {
        return parse_entries(io::stdin().lock());
    }
    match (&args.kind, &args.target, &args.field, &args.value) {
        (Some(kind), Some(target), Some(field), Some(value)) => Ok(vec![Entry {
            kind: *kind,
            target: target.clone(),
            field: *field,
            value: value.clone(),
        }]),
        _ => bail!("record needs <kind> <target> <field> <value> or --stdin"),
    }
}

/// Execute `uoccin record`.
///
/// # Errors
///
/// Fails on unparseable input, config resolution, lock contention, or a
/// run that cannot be written or finished.
pub fn run_record(args: &RecordArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let entries = collect_entries(args)?;
    if entries.is_empty() {
        bail!("nothing to record");
    }

    let config = globals.sync_config()?;
    let outcome = with_run(config, |agent| {
        entries
            .iter()
            .map(|e| {
                agent
                    .record(e.kind, &e.target, e.field, &e.value)
                    .map_err(anyhow::Error::from)
            })
            .collect()
    })?;

    render(output, &outcome, write_outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_lines_skip_blanks_and_comments() {
        let input = "# batch\n\nmovie|tt1|watchlist|true\nseries|500.1.2|subtitles|eng,ita\n";
        let entries = parse_entries(input.as_bytes()).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, Kind::Series);
        assert_eq!(entries[1].target, "500.1.2");
        assert_eq!(entries[1].field, Field::Subtitles);
        assert_eq!(entries[1].value, "eng,ita");
    }

    #[test]
    fn stdin_value_may_be_empty() {
        let entries = parse_entries("movie|tt1|tags|\n".as_bytes()).expect("parse");
        assert_eq!(entries[0].value, "");
    }

    #[test]
    fn stdin_reports_line_numbers() {
        let err = parse_entries("movie|tt1|watched|true\nmovie|tt2\n".as_bytes())
            .expect_err("short line");
        assert!(err.to_string().starts_with("line 2:"), "{err}");

        let err = parse_entries("book|x|watched|true\n".as_bytes()).expect_err("bad kind");
        assert!(format!("{err:#}").contains("line 1"), "{err:#}");
    }
}
