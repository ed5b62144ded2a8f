//! `uoccin show`: status of one movie, series or episode.

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;

use uoccin_core::command::Kind;
use uoccin_core::store::lookup::{MediaStatus, movie_status, series_status};

use super::Globals;
use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Record kind: movie or series.
    pub kind: Kind,

    /// Movie or series id.
    pub id: String,

    /// Season number (series only, needs --episode).
    #[arg(long, requires = "episode")]
    pub season: Option<u32>,

    /// Episode number (series only, needs --season).
    #[arg(long, requires = "season")]
    pub episode: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    kind: Kind,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode: Option<u32>,
    #[serde(flatten)]
    status: MediaStatus,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Execute `uoccin show`. Unknown ids are reported with every flag false.
///
/// # Errors
///
/// Fails if episode flags are given for a movie or the store is unreadable.
pub fn run_show(args: &ShowArgs, globals: &Globals, output: OutputMode) -> Result<()> {
    let episode = args.season.zip(args.episode);
    if args.kind == Kind::Movie && episode.is_some() {
        bail!("--season/--episode only apply to series");
    }

    let store = globals.load_store()?;
    let status = match args.kind {
        Kind::Movie => movie_status(&store, &args.id),
        Kind::Series => series_status(&store, &args.id, episode),
    };

    let result = ShowOutput {
        kind: args.kind,
        id: args.id.clone(),
        season: args.season,
        episode: args.episode,
        status,
    };

    render(output, &result, |r, w| {
        match (r.season, r.episode) {
            (Some(s), Some(e)) => writeln!(w, "{} {} S{s:02}E{e:02}", r.kind, r.id)?,
            _ => writeln!(w, "{} {}", r.kind, r.id)?,
        }
        pretty_kv(w, "Watchlist", yes_no(r.status.watchlist))?;
        pretty_kv(w, "Collected", yes_no(r.status.collected))?;
        pretty_kv(w, "Watched", yes_no(r.status.watched))?;
        if let Some(rating) = r.status.rating {
            pretty_kv(w, "Rating", rating.to_string())?;
        }
        if !r.status.tags.is_empty() {
            pretty_kv(w, "Tags", r.status.tags.join(", "))?;
        }
        if !r.status.subtitles.is_empty() {
            pretty_kv(w, "Subtitles", r.status.subtitles.join(", "))?;
        }
        Ok(())
    })
}
