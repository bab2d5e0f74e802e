mod media;
mod status;

pub use media::{Episode, EpisodeSlot, Media, Movie, Season, Show};
pub use status::{MovieStatus, ShowStatus};

use crate::metadata::MediaGuid;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Search outcome partitioned by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub movies: Vec<Movie>,
    pub series: Vec<Show>,
}

impl SearchResult {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            movies: Vec::new(),
            series: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.series.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.movies.len() + self.series.len()
    }

    /// GUIDs of every hit, movies first
    #[must_use]
    pub fn guids(&self) -> Vec<MediaGuid> {
        self.movies
            .iter()
            .map(|m| m.media.guid.clone())
            .chain(self.series.iter().map(|s| s.media.guid.clone()))
            .collect()
    }

    /// Append another partial result, keeping each list's internal order
    pub fn extend(&mut self, other: Self) {
        self.movies.extend(other.movies);
        self.series.extend(other.series);
    }
}

/// Result of a lookup by GUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaRecord {
    Movie(Movie),
    Show(Show),
}

/// Parse the date formats providers emit (`2008-01-20`, `2008-01-20 21:00:00`,
/// `2008-01-20T21:00:00Z`); anything else degrades to `None`
pub(crate) fn parse_air_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_air_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2008, 1, 20);
        assert_eq!(parse_air_date(Some("2008-01-20")), expected);
        assert_eq!(parse_air_date(Some("2008-01-20 21:00:00")), expected);
        assert_eq!(parse_air_date(Some("2008-01-20T21:00:00Z")), expected);
        assert_eq!(parse_air_date(Some("")), None);
        assert_eq!(parse_air_date(Some("soon")), None);
        assert_eq!(parse_air_date(None), None);
    }
}
