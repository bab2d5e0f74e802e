mod cache;
mod guid;
mod locale;
mod merge;
mod pagination;
mod provider;
mod service;
mod types;


pub use cache::{CacheKey, CachedValue, MetadataCache, TtlCache};
pub use guid::{MediaGuid, MediaKind, Provider};
pub use locale::Locale;
pub use merge::{FragmentSource, SeasonFragment, merge_seasons};
pub use pagination::{FanOut, Page, fetch_all, fetch_all_localized};
pub use provider::{
    Backoff, CallRequest, DEFAULT_MAX_RETRIES, HttpClient, MetadataProvider, ProviderContext,
    SeasonType, SuggestProvider, TmdbProvider, TvdbProvider, build_client,
    suggest::{IMDB_SITE_URL, SUGGEST_API_URL},
    tmdb::{TMDB_API_URL, TMDB_IMAGE_URL, TMDB_SITE_URL},
    tvdb::{TVDB_API_URL, TVDB_SITE_URL},
};
pub use service::{MetadataService, ProviderResults};
pub use types::{
    Episode, EpisodeSlot, Media, MediaRecord, Movie, MovieStatus, SearchResult, Season, Show,
    ShowStatus,
};

/// Metadata core result type
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Metadata core error types
///
/// Cloneable so a single failed fill can be handed to every coalesced waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Upstream error: {status}{}", .message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default())]
    UpstreamStatus { status: u16, message: Option<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MetadataError {
    /// Whether the Resilient Caller may spend another attempt on this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::UpstreamStatus { .. }
        )
    }

    /// Upstream HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
