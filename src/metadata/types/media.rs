use super::{MovieStatus, ShowStatus};
use crate::metadata::MediaGuid;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fields shared by every normalized entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Provider-qualified identifier
    pub guid: MediaGuid,
    /// Numeric id inside the provider
    pub source_id: u64,
    /// Public page on the provider's site
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub overview: Option<String>,
    /// Poster or still image URL
    pub image: Option<String>,
    /// First air / release date
    pub air_date: Option<NaiveDate>,
}

impl Media {
    pub fn new(guid: MediaGuid, source_id: u64) -> Self {
        Self {
            guid,
            source_id,
            source_url: None,
            title: None,
            overview: None,
            image: None,
            air_date: None,
        }
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }

    /// Empty strings count as absent
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_overview(mut self, overview: Option<String>) -> Self {
        self.overview = overview.filter(|o| !o.trim().is_empty());
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_air_date(mut self, air_date: Option<NaiveDate>) -> Self {
        self.air_date = air_date;
        self
    }

    /// Release year, if the air date is known
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.air_date.map(|d| d.year())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(flatten)]
    pub media: Media,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    pub status: Option<MovieStatus>,
}

impl Movie {
    #[must_use]
    pub const fn new(media: Media) -> Self {
        Self {
            media,
            runtime: None,
            status: None,
        }
    }

    pub fn with_runtime(mut self, runtime: Option<u32>) -> Self {
        self.runtime = runtime.filter(|r| *r > 0);
        self
    }

    pub fn with_status(mut self, status: Option<MovieStatus>) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    #[serde(flatten)]
    pub media: Media,
    pub status: Option<ShowStatus>,
    /// Ascending by season number
    pub seasons: Vec<Season>,
}

impl Show {
    #[must_use]
    pub const fn new(media: Media) -> Self {
        Self {
            media,
            status: None,
            seasons: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Option<ShowStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_seasons(mut self, seasons: Vec<Season>) -> Self {
        self.seasons = seasons;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub guid: MediaGuid,
    pub source_id: Option<u64>,
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub image: Option<String>,
    pub air_date: Option<NaiveDate>,
    /// Ordinal within the show; 0 holds specials
    pub number: u32,
    /// Ascending by episode number, numbers may be sparse
    pub episodes: Vec<Episode>,
    /// Numbers between the first and last known episode with no entry
    #[serde(default)]
    pub missing_episodes: Vec<u32>,
}

impl Season {
    pub fn new(guid: MediaGuid, number: u32) -> Self {
        Self {
            guid,
            source_id: None,
            source_url: None,
            title: None,
            overview: None,
            image: None,
            air_date: None,
            number,
            episodes: Vec::new(),
            missing_episodes: Vec::new(),
        }
    }

    /// Episodes indexed by their explicit number, with gaps between the
    /// lowest and highest known number filled by [`EpisodeSlot::Missing`]
    #[must_use]
    pub fn episode_slots(&self) -> Vec<EpisodeSlot<'_>> {
        let (Some(first), Some(last)) = (self.episodes.first(), self.episodes.last()) else {
            return Vec::new();
        };

        let mut known = self.episodes.iter().peekable();
        (first.number..=last.number)
            .map(|number| match known.next_if(|ep| ep.number == number) {
                Some(episode) => EpisodeSlot::Present(episode),
                None => EpisodeSlot::Missing(number),
            })
            .collect()
    }
}

/// Position in a season's episode index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeSlot<'a> {
    Present(&'a Episode),
    Missing(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(flatten)]
    pub media: Media,
    /// Ordinal within the season
    pub number: u32,
    /// Runtime in minutes
    pub runtime: Option<u32>,
}

impl Episode {
    #[must_use]
    pub const fn new(media: Media, number: u32) -> Self {
        Self {
            media,
            number,
            runtime: None,
        }
    }

    pub fn with_runtime(mut self, runtime: Option<u32>) -> Self {
        self.runtime = runtime.filter(|r| *r > 0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Provider;

    fn episode(show: &MediaGuid, season: u32, number: u32) -> Episode {
        Episode::new(
            Media::new(show.season(season).episode(number), u64::from(number)),
            number,
        )
    }

    #[test]
    fn test_media_builder_drops_blank_text() {
        let media = Media::new(MediaGuid::movie(Provider::Tmdb, "603"), 603)
            .with_title(Some("  ".to_string()))
            .with_overview(Some("A hacker learns the truth.".to_string()));

        assert!(media.title.is_none());
        assert_eq!(media.overview.as_deref(), Some("A hacker learns the truth."));
    }

    #[test]
    fn test_episode_slots_pad_gaps() {
        let show = MediaGuid::series(Provider::Tvdb, "1");
        let mut season = Season::new(show.season(1), 1);
        season.episodes = vec![
            episode(&show, 1, 2),
            episode(&show, 1, 3),
            episode(&show, 1, 6),
        ];

        let slots = season.episode_slots();
        let shape: Vec<Option<u32>> = slots
            .iter()
            .map(|slot| match slot {
                EpisodeSlot::Present(ep) => Some(ep.number),
                EpisodeSlot::Missing(_) => None,
            })
            .collect();

        assert_eq!(shape, vec![Some(2), Some(3), None, None, Some(6)]);
        assert_eq!(slots[2], EpisodeSlot::Missing(4));
    }

    #[test]
    fn test_movie_flattens_media_fields() {
        let movie = Movie::new(Media::new(MediaGuid::movie(Provider::Tmdb, "603"), 603))
            .with_runtime(Some(136))
            .with_status(Some(MovieStatus::Released));

        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["guid"], "tmdb://movie/603");
        assert_eq!(json["runtime"], 136);
        assert_eq!(json["status"], "released");
    }
}
