//! The reducer: folds commands into a [`StateStore`].
//!
//! Pure and deterministic. Commands are stable-sorted by `timestamp_ms`
//! and applied one by one; after each command the existence rules are
//! enforced on the touched record. Every field rule is idempotent, so
//! replaying a log that was already applied leaves the store unchanged.
//!
//! Semantically invalid commands (bad rating, episode field without an
//! episode, malformed target) are skipped and returned in
//! [`Reduction::rejected`]; they never abort the fold.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::command::{Command, CommandError, Field, Kind, SeriesTarget};
use crate::config::FormatConfig;
use crate::store::{MovieRecord, SeriesRecord, StateStore, get_or_insert_default};

/// A command the reducer refused, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub command: Command,
    pub error: CommandError,
}

/// Result of one reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub store: StateStore,
    /// At least one movie record changed.
    pub touched_movies: bool,
    /// At least one series record changed.
    pub touched_series: bool,
    /// Number of commands applied (changed or not).
    pub applied: usize,
    pub rejected: Vec<Rejected>,
}

impl Reduction {
    /// Whether the store needs to be persisted.
    #[must_use]
    pub const fn touched(&self) -> bool {
        self.touched_movies || self.touched_series
    }
}

/// Apply `commands` to `store` in timestamp order.
#[must_use]
pub fn reduce(store: StateStore, commands: &[Command], format: &FormatConfig) -> Reduction {
    let mut ordered: Vec<&Command> = commands.iter().collect();
    ordered.sort_by_key(|c| c.timestamp_ms);

    let mut out = Reduction {
        store,
        touched_movies: false,
        touched_series: false,
        applied: 0,
        rejected: Vec::new(),
    };

    for command in ordered {
        let result = match command.kind {
            Kind::Movie => apply_movie(&mut out.store, command, format).map(|changed| {
                out.touched_movies |= changed;
                changed
            }),
            Kind::Series => apply_series(&mut out.store, command, format).map(|changed| {
                out.touched_series |= changed;
                changed
            }),
        };

        match result {
            Ok(changed) => {
                out.applied += 1;
                debug!(
                    ts = command.timestamp_ms,
                    kind = %command.kind,
                    target = %command.target,
                    field = %command.field,
                    changed,
                    "applied command"
                );
            }
            Err(error) => {
                warn!(
                    ts = command.timestamp_ms,
                    kind = %command.kind,
                    target = %command.target,
                    field = %command.field,
                    %error,
                    "skipping invalid command"
                );
                out.rejected.push(Rejected {
                    command: command.clone(),
                    error,
                });
            }
        }
    }

    out
}

/// Split a list value on `sep`, trimming items and dropping empty ones.
#[must_use]
pub fn split_list(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn list_as_set(value: &str, sep: char) -> Option<BTreeSet<String>> {
    let items: BTreeSet<String> = split_list(value, sep).into_iter().collect();
    (!items.is_empty()).then_some(items)
}

fn ordered_unique(value: &str, sep: char) -> Vec<String> {
    let mut seen = BTreeSet::new();
    split_list(value, sep)
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn parse_rating(value: &str) -> Result<i64, CommandError> {
    value
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidRating(value.to_string()))
}

enum MovieChange {
    Watchlist(bool),
    Collected(bool),
    Watched(bool),
    Tags(Option<BTreeSet<String>>),
    Subtitles(Option<BTreeSet<String>>),
    Rating(i64),
}

impl MovieChange {
    fn parse(command: &Command, format: &FormatConfig) -> Result<Self, CommandError> {
        let sep = format.list_separator;
        Ok(match command.field {
            Field::Watchlist => Self::Watchlist(command.flag()),
            Field::Collected => Self::Collected(command.flag()),
            Field::Watched => Self::Watched(command.flag()),
            Field::Tags => Self::Tags(list_as_set(&command.value, sep)),
            Field::Subtitles => Self::Subtitles(list_as_set(&command.value, sep)),
            Field::Rating => Self::Rating(parse_rating(&command.value)?),
        })
    }

    fn apply(self, movie: &mut MovieRecord) {
        match self {
            Self::Watchlist(on) => movie.watchlist = on,
            Self::Collected(on) => movie.collected = on,
            Self::Watched(on) => movie.watched = on,
            Self::Tags(tags) => movie.tags = tags,
            Self::Subtitles(subs) => movie.subtitles = subs,
            Self::Rating(rating) => movie.rating = Some(rating),
        }
    }
}

fn apply_movie(
    store: &mut StateStore,
    command: &Command,
    format: &FormatConfig,
) -> Result<bool, CommandError> {
    let id = command.target.trim();
    if id.is_empty() {
        return Err(CommandError::EmptyTarget);
    }
    let change = MovieChange::parse(command, format)?;

    let before = store.movies.get(id).cloned();
    let movie = get_or_insert_default(&mut store.movies, id.to_string(), MovieRecord::default());
    change.apply(movie);
    if !movie.is_live() {
        store.movies.remove(id);
    }
    Ok(store.movies.get(id) != before.as_ref())
}

enum SeriesChange {
    Watchlist(bool),
    Tags(Option<BTreeSet<String>>),
    Rating(i64),
    Collected { season: u32, episode: u32, on: bool },
    Subtitles { season: u32, episode: u32, langs: Vec<String> },
    Watched { season: u32, episode: u32, on: bool },
}

impl SeriesChange {
    fn parse(
        command: &Command,
        target: &SeriesTarget<'_>,
        format: &FormatConfig,
    ) -> Result<Self, CommandError> {
        let sep = format.list_separator;
        if !command.field.is_episode_scoped() {
            return Ok(match command.field {
                Field::Watchlist => Self::Watchlist(command.flag()),
                Field::Tags => Self::Tags(list_as_set(&command.value, sep)),
                _ => Self::Rating(parse_rating(&command.value)?),
            });
        }

        let Some((season, episode)) = target.episode else {
            return Err(CommandError::MissingEpisode {
                field: command.field,
                target: command.target.clone(),
            });
        };
        Ok(match command.field {
            Field::Collected => Self::Collected {
                season,
                episode,
                on: command.flag(),
            },
            Field::Watched => Self::Watched {
                season,
                episode,
                on: command.flag(),
            },
            _ => Self::Subtitles {
                season,
                episode,
                langs: ordered_unique(&command.value, sep),
            },
        })
    }

    fn apply(self, series: &mut SeriesRecord) {
        match self {
            Self::Watchlist(on) => series.watchlist = on,
            Self::Tags(tags) => series.tags = tags,
            Self::Rating(rating) => series.rating = Some(rating),
            Self::Collected {
                season,
                episode,
                on: true,
            } => {
                series
                    .collected
                    .entry(season)
                    .or_default()
                    .entry(episode)
                    .or_default();
            }
            Self::Collected {
                season,
                episode,
                on: false,
            } => {
                if let Some(eps) = series.collected.get_mut(&season) {
                    eps.remove(&episode);
                    if eps.is_empty() {
                        series.collected.remove(&season);
                    }
                }
            }
            Self::Subtitles {
                season,
                episode,
                langs,
            } => {
                // Only collected episodes carry subtitles.
                if let Some(subs) = series
                    .collected
                    .get_mut(&season)
                    .and_then(|eps| eps.get_mut(&episode))
                {
                    *subs = langs;
                }
            }
            Self::Watched {
                season,
                episode,
                on: true,
            } => {
                series.watched.entry(season).or_default().insert(episode);
            }
            Self::Watched {
                season,
                episode,
                on: false,
            } => {
                if let Some(eps) = series.watched.get_mut(&season) {
                    eps.remove(&episode);
                    if eps.is_empty() {
                        series.watched.remove(&season);
                    }
                }
            }
        }
    }
}

fn apply_series(
    store: &mut StateStore,
    command: &Command,
    format: &FormatConfig,
) -> Result<bool, CommandError> {
    let target = SeriesTarget::parse(command.target.trim(), format.target_separator)?;
    let change = SeriesChange::parse(command, &target, format)?;
    let id = target.series_id;

    let before = store.series.get(id).cloned();
    let series = get_or_insert_default(&mut store.series, id.to_string(), SeriesRecord::default());
    change.apply(series);
    if !series.is_live() {
        store.series.remove(id);
    }
    Ok(store.series.get(id) != before.as_ref())
}
