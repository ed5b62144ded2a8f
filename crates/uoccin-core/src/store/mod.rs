//! The state store: every movie and series record of a shared folder.
//!
//! A record exists only while one of its existence flags holds:
//!
//! - movie: `watchlist || collected || watched`
//! - series: `watchlist || !collected.is_empty() || !watched.is_empty()`
//!
//! The reducer deletes a record as soon as this stops being true, so a
//! persisted store never contains zero-value stubs.

pub mod file;
pub mod lookup;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name given to records created by commands (names come from scrapers,
/// which are out of scope here).
pub const PLACEHOLDER_NAME: &str = "N/A";

fn placeholder_name() -> String {
    PLACEHOLDER_NAME.to_string()
}

/// A movie, keyed by its external id in [`StateStore::movies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    #[serde(default = "placeholder_name")]
    pub name: String,
    #[serde(default)]
    pub watchlist: bool,
    #[serde(default)]
    pub collected: bool,
    #[serde(default)]
    pub watched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
}

impl Default for MovieRecord {
    fn default() -> Self {
        Self {
            name: placeholder_name(),
            watchlist: false,
            collected: false,
            watched: false,
            tags: None,
            subtitles: None,
            rating: None,
        }
    }
}

impl MovieRecord {
    /// Whether the record may exist in a store.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.watchlist || self.collected || self.watched
    }
}

/// A series, keyed by its external id in [`StateStore::series`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    #[serde(default = "placeholder_name")]
    pub name: String,
    #[serde(default)]
    pub watchlist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    /// season → episode → subtitle languages. A present episode key means
    /// the episode is collected, even with no subtitles.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub collected: BTreeMap<u32, BTreeMap<u32, Vec<String>>>,
    /// season → watched episodes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub watched: BTreeMap<u32, BTreeSet<u32>>,
}

impl Default for SeriesRecord {
    fn default() -> Self {
        Self {
            name: placeholder_name(),
            watchlist: false,
            tags: None,
            rating: None,
            collected: BTreeMap::new(),
            watched: BTreeMap::new(),
        }
    }
}

impl SeriesRecord {
    /// Whether the record may exist in a store.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.watchlist || !self.collected.is_empty() || !self.watched.is_empty()
    }

    /// Whether `(season, episode)` is collected.
    #[must_use]
    pub fn has_collected(&self, season: u32, episode: u32) -> bool {
        self.collected
            .get(&season)
            .is_some_and(|eps| eps.contains_key(&episode))
    }

    /// Whether `(season, episode)` is watched.
    #[must_use]
    pub fn has_watched(&self, season: u32, episode: u32) -> bool {
        self.watched
            .get(&season)
            .is_some_and(|eps| eps.contains(&episode))
    }
}

/// The canonical document persisted as `uoccin.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStore {
    #[serde(default)]
    pub movies: BTreeMap<String, MovieRecord>,
    #[serde(default)]
    pub series: BTreeMap<String, SeriesRecord>,
}

impl StateStore {
    /// Look up a movie.
    #[must_use]
    pub fn movie(&self, id: &str) -> Option<&MovieRecord> {
        self.movies.get(id)
    }

    /// Look up a series.
    #[must_use]
    pub fn series(&self, id: &str) -> Option<&SeriesRecord> {
        self.series.get(id)
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.series.is_empty()
    }

    /// Describe every record or season entry that breaks the existence
    /// rules. Empty for any store produced by the reducer.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (id, movie) in &self.movies {
            if !movie.is_live() {
                out.push(format!("movie {id} has no watchlist/collected/watched flag"));
            }
        }
        for (id, series) in &self.series {
            if !series.is_live() {
                out.push(format!("series {id} is not watchlisted, collected or watched"));
            }
            for (season, eps) in &series.collected {
                if eps.is_empty() {
                    out.push(format!("series {id} has empty collected season {season}"));
                }
            }
            for (season, eps) in &series.watched {
                if eps.is_empty() {
                    out.push(format!("series {id} has empty watched season {season}"));
                }
            }
        }
        out
    }
}

/// Return the value at `key`, inserting `default` first if absent.
pub fn get_or_insert_default<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, default: V) -> &mut V {
    map.entry(key).or_insert(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_use_placeholder_name_and_are_dead() {
        let movie = MovieRecord::default();
        assert_eq!(movie.name, PLACEHOLDER_NAME);
        assert!(!movie.is_live());

        let series = SeriesRecord::default();
        assert_eq!(series.name, PLACEHOLDER_NAME);
        assert!(!series.is_live());
    }

    #[test]
    fn any_flag_makes_a_movie_live() {
        for setter in [
            |m: &mut MovieRecord| m.watchlist = true,
            |m: &mut MovieRecord| m.collected = true,
            |m: &mut MovieRecord| m.watched = true,
        ] {
            let mut movie = MovieRecord::default();
            setter(&mut movie);
            assert!(movie.is_live());
        }
    }

    #[test]
    fn series_liveness_and_episode_queries() {
        let mut series = SeriesRecord::default();
        series
            .collected
            .entry(1)
            .or_default()
            .insert(2, vec!["eng".into()]);
        assert!(series.is_live());
        assert!(series.has_collected(1, 2));
        assert!(!series.has_collected(1, 3));
        assert!(!series.has_watched(1, 2));

        series.collected.clear();
        series.watched.entry(3).or_default().insert(7);
        assert!(series.is_live());
        assert!(series.has_watched(3, 7));
    }

    #[test]
    fn get_or_insert_default_keeps_existing_value() {
        let mut map = BTreeMap::new();
        *get_or_insert_default(&mut map, "a", 1) += 10;
        *get_or_insert_default(&mut map, "a", 100) += 1;
        assert_eq!(map["a"], 12);
    }

    #[test]
    fn violations_report_stubs_and_empty_seasons() {
        let mut store = StateStore::default();
        store.movies.insert("tt1".into(), MovieRecord::default());
        let mut series = SeriesRecord {
            watchlist: true,
            ..SeriesRecord::default()
        };
        series.watched.insert(2, BTreeSet::new());
        store.series.insert("500".into(), series);

        let violations = store.invariant_violations();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("movie tt1"));
        assert!(violations[1].contains("watched season 2"));
    }

    #[test]
    fn json_shape_uses_string_episode_keys_in_numeric_order() {
        let mut series = SeriesRecord::default();
        let season = series.collected.entry(1).or_default();
        season.insert(10, vec![]);
        season.insert(2, vec!["eng".into(), "ita".into()]);
        let text = serde_json::to_string(&series).expect("serialize");
        let two = text.find("\"2\":").expect("episode 2");
        let ten = text.find("\"10\":").expect("episode 10");
        assert!(two < ten, "episodes must be ordered numerically: {text}");

        let json: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(json["collected"]["1"]["2"], serde_json::json!(["eng", "ita"]));
        assert!(json.get("watched").is_none());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn sparse_json_fills_defaults() {
        let store: StateStore = serde_json::from_str(
            r#"{"movies": {"tt1": {"watched": true}}, "series": {"500": {"watched": {"1": [3, 1]}}}}"#,
        )
        .expect("deserialize");
        let movie = store.movie("tt1").expect("movie");
        assert_eq!(movie.name, PLACEHOLDER_NAME);
        assert!(movie.watched && !movie.watchlist);
        let series = store.series("500").expect("series");
        assert!(series.has_watched(1, 1) && series.has_watched(1, 3));
        assert!(store.invariant_violations().is_empty());
    }
}
