use crate::metadata::{MetadataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream metadata source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Tmdb,
    Tvdb,
    Imdb,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tmdb => "tmdb",
            Self::Tvdb => "tvdb",
            Self::Imdb => "imdb",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tmdb" => Ok(Self::Tmdb),
            "tvdb" => Ok(Self::Tvdb),
            "imdb" => Ok(Self::Imdb),
            other => Err(MetadataError::Validation(format!(
                "Unsupported provider: {other}"
            ))),
        }
    }
}

/// Top-level media classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub const ALL: [Self; 2] = [Self::Movie, Self::Series];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "series" | "show" | "shows" | "tv" => Ok(Self::Series),
            other => Err(MetadataError::Validation(format!(
                "Unsupported media type: {other}"
            ))),
        }
    }
}

/// Provider-qualified identifier, doubling as cache key and merge identity.
///
/// Wire format: `<provider>://<movie|series>/<id>[/seasons/<n>[/episodes/<m>]]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaGuid {
    provider: Provider,
    kind: MediaKind,
    id: String,
    season: Option<u32>,
    episode: Option<u32>,
}

impl MediaGuid {
    pub fn new(provider: Provider, kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            id: id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn movie(provider: Provider, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Movie, id)
    }

    pub fn series(provider: Provider, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Series, id)
    }

    /// GUID of season `number` under this show
    #[must_use]
    pub fn season(&self, number: u32) -> Self {
        Self {
            season: Some(number),
            episode: None,
            ..self.show()
        }
    }

    /// GUID of episode `number` under this season.
    ///
    /// On a show-level GUID the episode is placed in season 0.
    #[must_use]
    pub fn episode(&self, number: u32) -> Self {
        Self {
            season: Some(self.season.unwrap_or(0)),
            episode: Some(number),
            ..self.show()
        }
    }

    /// The top-level (movie or show) GUID this one belongs to
    #[must_use]
    pub fn show(&self) -> Self {
        Self {
            provider: self.provider,
            kind: self.kind,
            id: self.id.clone(),
            season: None,
            episode: None,
        }
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.kind
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn season_number(&self) -> Option<u32> {
        self.season
    }

    #[must_use]
    pub const fn episode_number(&self) -> Option<u32> {
        self.episode
    }

    /// True for movie and show GUIDs, false for seasons and episodes
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.season.is_none() && self.episode.is_none()
    }
}

impl fmt::Display for MediaGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.provider, self.kind, self.id)?;
        if let Some(season) = self.season {
            write!(f, "/seasons/{season}")?;
            if let Some(episode) = self.episode {
                write!(f, "/episodes/{episode}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaGuid {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MetadataError::Validation(format!("Invalid media GUID: {s}"));

        let (provider, path) = s.split_once("://").ok_or_else(invalid)?;
        let provider: Provider = provider.parse()?;

        let parts: Vec<&str> = path.split('/').collect();
        let (kind, id) = match parts.as_slice() {
            [kind, id, ..] if !id.is_empty() => (kind.parse::<MediaKind>()?, *id),
            _ => return Err(invalid()),
        };

        let number = |raw: &str| raw.parse::<u32>().map_err(|_| invalid());

        let (season, episode) = match &parts[2..] {
            [] => (None, None),
            ["seasons", n] if kind == MediaKind::Series => (Some(number(n)?), None),
            ["seasons", n, "episodes", m] if kind == MediaKind::Series => {
                (Some(number(n)?), Some(number(m)?))
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            provider,
            kind,
            id: id.to_string(),
            season,
            episode,
        })
    }
}

impl TryFrom<String> for MediaGuid {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MediaGuid> for String {
    fn from(guid: MediaGuid) -> Self {
        guid.to_string()
    }
}
