//! Commands: immutable `(timestamp, kind, target, field, value)` facts.
//!
//! A command is the unit of replication. Devices append commands to diff
//! logs ([`crate::diff_log`]), ship the logs through the shared folder, and
//! every device folds them into the state store with [`crate::reduce`].
//!
//! # Targets
//!
//! For movies the target is the movie id. For series it is either a bare
//! series id (`watchlist`, `tags`, `rating`) or
//! `<series_id><sep><season><sep><episode>` (`collected`, `subtitles`,
//! `watched`), where `<sep>` is the configured target separator (`.` by
//! default).

pub mod parser;
pub mod types;
pub mod writer;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

pub use types::{Field, Kind};

/// Errors for commands that are well-formed lines but semantically invalid.
///
/// These never abort a batch: the reducer logs them and skips the command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The kind is not `movie` or `series`.
    #[error("unknown kind '{0}': expected movie or series")]
    UnknownKind(String),

    /// The field is not one of the six known fields.
    #[error(
        "unknown field '{0}': expected one of watchlist, collected, watched, tags, subtitles, rating"
    )]
    UnknownField(String),

    /// The target id is empty.
    #[error("empty target")]
    EmptyTarget,

    /// A series target does not split into 1 or 3 parts.
    #[error("malformed series target '{0}'")]
    MalformedTarget(String),

    /// A season or episode number is not an unsigned integer.
    #[error("invalid season/episode number in target '{0}'")]
    InvalidEpisodeNumber(String),

    /// An episode-scoped field arrived with a bare series target.
    #[error("field {field} requires season and episode numbers, got target '{target}'")]
    MissingEpisode {
        /// The episode-scoped field.
        field: Field,
        /// The offending target.
        target: String,
    },

    /// A rating value is not an integer.
    #[error("rating must be an integer, got '{0}'")]
    InvalidRating(String),

    /// `mark`/`unmark` was asked to toggle a field that is not a flag.
    #[error("field {0} is not a flag")]
    NotAFlag(Field),
}

impl CommandError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidCommand
    }
}

/// One atomic state change.
///
/// Ordering between commands is defined solely by `timestamp_ms`; ties keep
/// their original append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Wall-clock milliseconds since the Unix epoch at the authoring device.
    pub timestamp_ms: i64,
    /// Movie or series.
    pub kind: Kind,
    /// Movie id, series id, or series episode target.
    pub target: String,
    /// Field being changed.
    pub field: Field,
    /// New value in its textual form (`true`, `eng,ita`, `8`, ...).
    pub value: String,
}

impl Command {
    /// Build a command.
    pub fn new(
        timestamp_ms: i64,
        kind: Kind,
        target: impl Into<String>,
        field: Field,
        value: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            kind,
            target: target.into(),
            field,
            value: value.into(),
        }
    }

    /// Interpret the value as a boolean flag. Only `true` is true.
    #[must_use]
    pub fn flag(&self) -> bool {
        self.value.trim() == "true"
    }
}

/// The parsed target of a series command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesTarget<'a> {
    /// Series id.
    pub series_id: &'a str,
    /// `(season, episode)` when the target names an episode.
    pub episode: Option<(u32, u32)>,
}

impl<'a> SeriesTarget<'a> {
    /// Parse `<series_id>` or `<series_id><sep><season><sep><episode>`.
    ///
    /// A two-part target names the series alone; the season part is
    /// ignored, so it only works with series-level fields.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::EmptyTarget`] for an empty id,
    /// [`CommandError::MalformedTarget`] for more than three parts, and
    /// [`CommandError::InvalidEpisodeNumber`] when season or episode is not
    /// an unsigned integer.
    pub fn parse(raw: &'a str, separator: char) -> Result<Self, CommandError> {
        let parts: Vec<&str> = raw.split(separator).collect();
        let series_id = parts[0].trim();
        if series_id.is_empty() {
            return Err(CommandError::EmptyTarget);
        }

        match parts.as_slice() {
            [_] | [_, _] => Ok(Self {
                series_id,
                episode: None,
            }),
            [_, season, episode] => {
                let season: u32 = season
                    .trim()
                    .parse()
                    .map_err(|_| CommandError::InvalidEpisodeNumber(raw.to_string()))?;
                let episode: u32 = episode
                    .trim()
                    .parse()
                    .map_err(|_| CommandError::InvalidEpisodeNumber(raw.to_string()))?;
                Ok(Self {
                    series_id,
                    episode: Some((season, episode)),
                })
            }
            _ => Err(CommandError::MalformedTarget(raw.to_string())),
        }
    }
}

/// Format an episode target with the given separator.
#[must_use]
pub fn episode_target(series_id: &str, season: u32, episode: u32, separator: char) -> String {
    format!("{series_id}{separator}{season}{separator}{episode}")
}
