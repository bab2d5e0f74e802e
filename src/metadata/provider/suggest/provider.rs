use super::api_types::{SuggestEntry, SuggestResponse};
use crate::metadata::{
    Locale, MediaGuid, MediaKind, MetadataError, Provider, Result,
    provider::{CallRequest, HttpClient, MetadataProvider, ProviderContext, ensure_supported, no_results},
    types::{Media, Movie, SearchResult, Show},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const SUGGEST_API_URL: &str = "https://sg.media-imdb.com";
pub const IMDB_SITE_URL: &str = "https://www.imdb.com";

const CALLER: &str = "IMDb";

/// Qualifiers that mark a hit as a series
const SERIES_QUALIFIERS: &[&str] = &["TV series", "TV mini-series"];

static JSONP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*imdb\$[^(]*\((.*)\)\s*;?\s*$").expect("Invalid JSONP regex")
});

/// Strip the JSONP callback and decode the payload
fn decode_jsonp(body: &str) -> Result<SuggestResponse> {
    let payload = JSONP
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| MetadataError::Decode("Response is not an imdb$ JSONP payload".to_string()))?;

    Ok(serde_json::from_str(payload.as_str())?)
}

/// Search-only adapter for the title suggestion endpoint
pub struct SuggestProvider {
    client: HttpClient,
    site_url: String,
}

impl SuggestProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            client: ctx.http(SUGGEST_API_URL),
            site_url: IMDB_SITE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, ctx: &ProviderContext, api_url: &str) -> Self {
        self.client = ctx.http(api_url);
        self
    }

    #[must_use]
    pub fn with_site_url(mut self, site_url: &str) -> Self {
        self.site_url = site_url.trim_end_matches('/').to_string();
        self
    }

    /// `/suggests/<first letter>/<encoded title>.json`
    fn endpoint(title: &str) -> Result<String> {
        let title = title.trim();
        let first = title
            .chars()
            .next()
            .ok_or_else(|| MetadataError::Validation("Empty search title".to_string()))?;

        Ok(format!(
            "/suggests/{}/{}.json",
            first.to_lowercase(),
            urlencoding::encode(title)
        ))
    }

    fn entry(&self, entry: SuggestEntry) -> Option<(MediaKind, Media)> {
        let qualifier = entry.q.as_deref()?;
        let kind = if SERIES_QUALIFIERS.contains(&qualifier) {
            MediaKind::Series
        } else {
            MediaKind::Movie
        };
        let source_id = entry.id.strip_prefix("tt")?.parse().ok()?;

        let media = Media::new(MediaGuid::new(Provider::Imdb, kind, entry.id.clone()), source_id)
            .with_source_url(Some(format!("{}/title/{}/", self.site_url, entry.id)))
            .with_image(entry.poster())
            .with_air_date(entry.y.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)))
            .with_title(entry.l);

        Some((kind, media))
    }
}

#[async_trait]
impl MetadataProvider for SuggestProvider {
    fn id(&self) -> Provider {
        Provider::Imdb
    }

    fn name(&self) -> &'static str {
        "IMDb suggestions"
    }

    fn supported_kinds(&self) -> &[MediaKind] {
        &MediaKind::ALL
    }

    fn supports_lookup(&self) -> bool {
        false
    }

    async fn search(
        &self,
        title: &str,
        kind: Option<MediaKind>,
        _locale: &Locale,
    ) -> Result<SearchResult> {
        ensure_supported(self, kind)?;

        let request = CallRequest::get(Self::endpoint(title)?).caller(CALLER);
        let response = self.client.call_with(&request, decode_jsonp).await?;
        debug!(query = title, entries = response.d.len(), "Suggestions received");

        let mut result = SearchResult::new(title.trim());
        for (hit_kind, media) in response.d.into_iter().filter_map(|e| self.entry(e)) {
            if kind.is_some_and(|k| k != hit_kind) {
                continue;
            }
            match hit_kind {
                MediaKind::Movie => result.movies.push(Movie::new(media)),
                MediaKind::Series => result.series.push(Show::new(media)),
            }
        }

        if result.is_empty() {
            return Err(no_results(Provider::Imdb, title));
        }
        Ok(result)
    }

    async fn get_movie(&self, guid: &MediaGuid, _locale: &Locale) -> Result<Movie> {
        Err(MetadataError::Validation(format!(
            "{guid}: imdb supports search only"
        )))
    }

    async fn get_show(
        &self,
        guid: &MediaGuid,
        _locale: &Locale,
        _include_episodes: bool,
    ) -> Result<Show> {
        Err(MetadataError::Validation(format!(
            "{guid}: imdb supports search only"
        )))
    }
}
