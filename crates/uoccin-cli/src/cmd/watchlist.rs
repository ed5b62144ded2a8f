//! `uoccin watchlist`: list watchlisted records, optionally filtered by tag.

use anyhow::Result;
use clap::Args;

use uoccin_core::command::Kind;
use uoccin_core::store::lookup::{TagFilter, TagMatch, watchlist};

use super::Globals;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct WatchlistArgs {
    /// Record kind: movie or series.
    pub kind: Kind,

    /// Filter by tag. Repeat or comma-separate for several.
    #[arg(long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// How tags are matched: any, all or none.
    #[arg(long, default_value_t = TagMatch::Any)]
    pub check: TagMatch,
}

/// Execute `uoccin watchlist`.
///
/// # Errors
///
/// Fails if the state store cannot be read.
pub fn run_watchlist(args: &WatchlistArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let store = globals.load_store()?;
    let filter = TagFilter {
        tags: args.tags.clone(),
        mode: args.check,
    };
    let entries = watchlist(&store, args.kind, &filter);

    render(output, &entries, |list, w| {
        if list.is_empty() {
            return writeln!(w, "(no {} on the watchlist)", args.kind);
        }
        for entry in list {
            if entry.tags.is_empty() {
                writeln!(w, "{:<12} {}", entry.id, entry.name)?;
            } else {
                writeln!(w, "{:<12} {}  [{}]", entry.id, entry.name, entry.tags.join(", "))?;
            }
        }
        Ok(())
    })
}
