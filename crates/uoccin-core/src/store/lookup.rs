//! Read-side queries over a [`StateStore`].

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::StateStore;
use crate::command::Kind;

/// Flags and attributes of one movie, series or episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaStatus {
    pub watchlist: bool,
    pub collected: bool,
    pub watched: bool,
    pub rating: Option<i64>,
    pub tags: Vec<String>,
    pub subtitles: Vec<String>,
}

fn sorted(set: Option<&BTreeSet<String>>) -> Vec<String> {
    set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

/// Status of a movie. Unknown ids are all-false.
#[must_use]
pub fn movie_status(store: &StateStore, id: &str) -> MediaStatus {
    store.movie(id).map_or_else(MediaStatus::default, |m| MediaStatus {
        watchlist: m.watchlist,
        collected: m.collected,
        watched: m.watched,
        rating: m.rating,
        tags: sorted(m.tags.as_ref()),
        subtitles: sorted(m.subtitles.as_ref()),
    })
}

/// Status of a series, or of one of its episodes.
///
/// For a whole series, `collected`/`watched` mean "at least one episode".
/// For an episode they describe that episode, and `subtitles` is its list.
#[must_use]
pub fn series_status(store: &StateStore, id: &str, episode: Option<(u32, u32)>) -> MediaStatus {
    let Some(series) = store.series(id) else {
        return MediaStatus::default();
    };

    let (collected, watched, subtitles) = match episode {
        None => (!series.collected.is_empty(), !series.watched.is_empty(), Vec::new()),
        Some((season, ep)) => {
            let subs = series.collected.get(&season).and_then(|eps| eps.get(&ep));
            (
                subs.is_some(),
                series.has_watched(season, ep),
                subs.cloned().unwrap_or_default(),
            )
        }
    };

    MediaStatus {
        watchlist: series.watchlist,
        collected,
        watched,
        rating: series.rating,
        tags: sorted(series.tags.as_ref()),
        subtitles,
    }
}

/// How requested tags are matched against a record's tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// At least one requested tag is present.
    #[default]
    Any,
    /// Every requested tag is present.
    All,
    /// No requested tag is present.
    None,
}

impl fmt::Display for TagMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Any => "any",
            Self::All => "all",
            Self::None => "none",
        })
    }
}

impl FromStr for TagMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            other => Err(format!("unknown tag match '{other}': expected any, all or none")),
        }
    }
}

/// Tag filter for [`watchlist`]. No tags means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub tags: Vec<String>,
    pub mode: TagMatch,
}

impl TagFilter {
    fn matches(&self, record_tags: Option<&BTreeSet<String>>) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let has = |t: &String| record_tags.is_some_and(|set| set.contains(t));
        match self.mode {
            TagMatch::Any => self.tags.iter().any(has),
            TagMatch::All => self.tags.iter().all(has),
            TagMatch::None => !self.tags.iter().any(has),
        }
    }
}

/// One watchlisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchlistEntry {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// Watchlisted records of `kind` that pass `filter`, ordered by id.
#[must_use]
pub fn watchlist(store: &StateStore, kind: Kind, filter: &TagFilter) -> Vec<WatchlistEntry> {
    let entry = |id: &String, name: &String, tags: Option<&BTreeSet<String>>| WatchlistEntry {
        id: id.clone(),
        name: name.clone(),
        tags: sorted(tags),
    };

    match kind {
        Kind::Movie => store
            .movies
            .iter()
            .filter(|(_, m)| m.watchlist && filter.matches(m.tags.as_ref()))
            .map(|(id, m)| entry(id, &m.name, m.tags.as_ref()))
            .collect(),
        Kind::Series => store
            .series
            .iter()
            .filter(|(_, s)| s.watchlist && filter.matches(s.tags.as_ref()))
            .map(|(id, s)| entry(id, &s.name, s.tags.as_ref()))
            .collect(),
    }
}
