//! Kind and field enums for diff-log commands.
//!
//! Both are serialized as the lowercase words used in the `|`-separated diff
//! line format (`movie`, `series`, `watchlist`, `collected`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::CommandError;

/// The kind of entity a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// A movie, keyed by an IMDB-style id.
    Movie,
    /// A series (or one of its episodes), keyed by a TVDB-style id.
    Series,
}

impl Kind {
    /// All known kinds.
    pub const ALL: [Self; 2] = [Self::Movie, Self::Series];

    /// Return the word used in the line format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            _ => Err(CommandError::UnknownKind(s.to_string())),
        }
    }
}

/// The record field a command changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Watchlist,
    Collected,
    Watched,
    Tags,
    Subtitles,
    Rating,
}

impl Field {
    /// All known fields in line-format order.
    pub const ALL: [Self; 6] = [
        Self::Watchlist,
        Self::Collected,
        Self::Watched,
        Self::Tags,
        Self::Subtitles,
        Self::Rating,
    ];

    /// Return the word used in the line format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Collected => "collected",
            Self::Watched => "watched",
            Self::Tags => "tags",
            Self::Subtitles => "subtitles",
            Self::Rating => "rating",
        }
    }

    /// Boolean fields that decide whether a record exists at all.
    #[must_use]
    pub const fn is_flag(self) -> bool {
        matches!(self, Self::Watchlist | Self::Collected | Self::Watched)
    }

    /// Fields that need `<series>.<season>.<episode>` for series targets.
    #[must_use]
    pub const fn is_episode_scoped(self) -> bool {
        matches!(self, Self::Collected | Self::Subtitles | Self::Watched)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watchlist" => Ok(Self::Watchlist),
            "collected" => Ok(Self::Collected),
            "watched" => Ok(Self::Watched),
            "tags" => Ok(Self::Tags),
            "subtitles" => Ok(Self::Subtitles),
            "rating" => Ok(Self::Rating),
            _ => Err(CommandError::UnknownField(s.to_string())),
        }
    }
}

// Serialize as the line-format word so JSON reports match the diff files.
macro_rules! serde_as_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_as_str!(Kind);
serde_as_str!(Field);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_str() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().expect("parse"), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn field_roundtrips_through_str() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().expect("parse"), field);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "episode".parse::<Kind>().expect_err("should fail");
        assert_eq!(err, CommandError::UnknownKind("episode".into()));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("Movie".parse::<Kind>().is_err());
        assert!("WATCHED".parse::<Field>().is_err());
    }

    #[test]
    fn flag_and_episode_scope_classification() {
        let flags: Vec<Field> = Field::ALL.into_iter().filter(|f| f.is_flag()).collect();
        assert_eq!(flags, [Field::Watchlist, Field::Collected, Field::Watched]);

        let scoped: Vec<Field> = Field::ALL
            .into_iter()
            .filter(|f| f.is_episode_scoped())
            .collect();
        assert_eq!(scoped, [Field::Collected, Field::Watched, Field::Subtitles]);
    }

    #[test]
    fn serde_uses_line_format_words() {
        let json = serde_json::to_string(&Field::Subtitles).expect("serialize");
        assert_eq!(json, "\"subtitles\"");
        let kind: Kind = serde_json::from_str("\"series\"").expect("deserialize");
        assert_eq!(kind, Kind::Series);
        assert!(serde_json::from_str::<Kind>("\"book\"").is_err());
    }
}
