//! `uoccin mark` and `uoccin unmark`: set or clear one flag.

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};

use uoccin_core::command::{Field, Kind};

use super::{Globals, with_run, write_outcome};
use crate::output::{OutputMode, render};

/// The boolean fields a record can be marked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flag {
    Watchlist,
    Collected,
    Watched,
}

impl From<Flag> for Field {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::Watchlist => Self::Watchlist,
            Flag::Collected => Self::Collected,
            Flag::Watched => Self::Watched,
        }
    }
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Flag to set.
    #[arg(value_enum)]
    pub flag: Flag,

    /// Record kind: movie or series.
    pub kind: Kind,

    /// Movie id, series id or `<series>.<season>.<episode>`.
    pub target: String,

    /// Tags recorded together with a watchlist mark.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Subtitle languages recorded together with a collected mark.
    #[arg(long, value_delimiter = ',')]
    pub subtitles: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UnmarkArgs {
    /// Flag to clear.
    #[arg(value_enum)]
    pub flag: Flag,

    /// Record kind: movie or series.
    pub kind: Kind,

    /// Movie id, series id or `<series>.<season>.<episode>`.
    pub target: String,
}

fn details(args: &MarkArgs) -> Result<&[String]> {
    match args.flag {
        Flag::Watchlist if args.subtitles.is_empty() => Ok(&args.tags),
        Flag::Collected if args.tags.is_empty() => Ok(&args.subtitles),
        Flag::Watched if args.tags.is_empty() && args.subtitles.is_empty() => Ok(&[]),
        _ => bail!("--tags goes with `mark watchlist`, --subtitles with `mark collected`"),
    }
}

/// Execute `uoccin mark`.
///
/// # Errors
///
/// Fails on misplaced detail flags, config resolution, lock contention, or
/// a run that cannot be written or finished.
pub fn run_mark(args: &MarkArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let details = details(args)?;
    let config = globals.sync_config()?;
    let outcome = with_run(config, |agent| {
        Ok(agent.mark(args.kind, &args.target, args.flag.into(), true, details)?)
    })?;
    render(output, &outcome, write_outcome)
}

/// Execute `uoccin unmark`.
///
/// # Errors
///
/// Same as [`run_mark`].
pub fn run_unmark(args: &UnmarkArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let config = globals.sync_config()?;
    let outcome = with_run(config, |agent| {
        Ok(vec![agent.record_flag(
            args.kind,
            &args.target,
            args.flag.into(),
            false,
        )?])
    })?;
    render(output, &outcome, write_outcome)
}
