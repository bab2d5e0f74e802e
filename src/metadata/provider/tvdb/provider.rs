use super::{
    SeasonType,
    api_types::{
        EpisodePage, EpisodeRecord, Envelope, LoginData, MovieExtended, SearchHit, SeriesExtended,
        StatusRef, TranslationSet,
    },
};
use crate::metadata::{
    FanOut, Locale, MediaGuid, MediaKind, Page, Provider, Result, TtlCache,
    merge::{SeasonFragment, merge_seasons},
    provider::{
        CallRequest, HttpClient, MetadataProvider, ProviderContext, check_guid, ensure_supported,
        first_present, lookup_error, no_results, numeric_id,
    },
    types::{Episode, Media, Movie, MovieStatus, SearchResult, Season, Show, ShowStatus, parse_air_date},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TVDB_API_URL: &str = "https://api4.thetvdb.com/v4";
pub const TVDB_SITE_URL: &str = "https://thetvdb.com";

const CALLER: &str = "TVDB";
const TOKEN_KEY: &str = "tvdb/token";
const ENGLISH: &str = "eng";

pub struct TvdbProvider {
    client: HttpClient,
    api_key: String,
    pin: Option<String>,
    season_type: SeasonType,
    fan_out: FanOut,
    fallback_locale: Locale,
    site_url: String,
    /// Bearer token from the login exchange, valid for the session TTL
    tokens: TtlCache<String, String>,
}

impl TvdbProvider {
    pub fn new(ctx: &ProviderContext, api_key: impl Into<String>, session_ttl: Duration) -> Self {
        Self {
            client: ctx.http(TVDB_API_URL),
            api_key: api_key.into(),
            pin: None,
            season_type: SeasonType::default(),
            fan_out: ctx.fan_out,
            fallback_locale: ctx.fallback_locale.clone(),
            site_url: TVDB_SITE_URL.to_string(),
            tokens: TtlCache::new("tvdb-session", session_ttl, Some(1)),
        }
    }

    /// Subscriber PIN, required for user-supported keys
    #[must_use]
    pub fn with_pin(mut self, pin: Option<String>) -> Self {
        self.pin = pin.filter(|p| !p.trim().is_empty());
        self
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

    #[must_use]
    pub const fn with_season_type(mut self, season_type: SeasonType) -> Self {
        self.season_type = season_type;
        self
    }

    async fn login(&self) -> Result<String> {
        let mut body = serde_json::json!({ "apikey": self.api_key });
        if let Some(pin) = &self.pin {
            body["pin"] = serde_json::Value::String(pin.clone());
        }

        let response: Envelope<LoginData> = self
            .client
            .call_json(&CallRequest::post("/login").caller(CALLER).json(body))
            .await?;

        info!("TVDB session token obtained");
        Ok(response.data.token)
    }

    /// Cached token; concurrent callers share one login exchange
    async fn token(&self) -> Result<String> {
        self.tokens
            .get_or_try_fill(TOKEN_KEY.to_string(), self.login())
            .await
    }

    /// Authenticated call. A 401 skips the retry budget, drops the session
    /// token and replays the request once under a fresh login.
    async fn request<T: DeserializeOwned>(&self, request: CallRequest) -> Result<T> {
        let request = request.caller(CALLER).fail_fast_on(401);
        let token = self.token().await?;

        match self.client.call_json(&request.clone().bearer(&token)).await {
            Err(err) if err.status() == Some(401) => {
                warn!("TVDB rejected the session token, logging in again");
                self.tokens.remove(&TOKEN_KEY.to_string()).await;
                let token = self.token().await?;
                self.client.call_json(&request.bearer(&token)).await
            }
            result => result,
        }
    }

    fn page_url(&self, kind: &str, slug: Option<&str>) -> Option<String> {
        slug.map(|slug| format!("{}/{kind}/{slug}", self.site_url))
    }

    /// Localized translation, then English, then the original field
    fn translated(
        translations: Option<&TranslationSet>,
        locale: &Locale,
        pick: impl Fn(&TranslationSet, &str) -> Option<String>,
        original: Option<String>,
    ) -> Option<String> {
        let localized = translations.and_then(|t| pick(t, locale.tvdb_code()));
        let english = translations.and_then(|t| pick(t, ENGLISH));
        first_present([localized, english, original])
    }

    fn search_hit(&self, hit: SearchHit, locale: &Locale) -> Option<(MediaKind, Media, Option<String>)> {
        let kind = match hit.kind.as_str() {
            "movie" => MediaKind::Movie,
            "series" => MediaKind::Series,
            _ => return None,
        };
        let Some(id) = hit.numeric_id() else {
            warn!(tvdb_id = %hit.tvdb_id, "Skipping TVDB hit without a numeric id");
            return None;
        };

        let code = locale.tvdb_code();
        let lookup = |map: Option<&std::collections::HashMap<String, String>>, key: &str| {
            map.and_then(|m| m.get(key)).cloned()
        };
        let title = first_present([
            lookup(hit.translations.as_ref(), code),
            lookup(hit.translations.as_ref(), ENGLISH),
            hit.name,
        ]);
        let overview = first_present([
            lookup(hit.overviews.as_ref(), code),
            lookup(hit.overviews.as_ref(), ENGLISH),
            hit.overview,
        ]);
        let air_date = parse_air_date(hit.first_air_time.as_deref()).or_else(|| {
            let year = hit.year.as_deref()?.trim().parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        });
        let section = if kind == MediaKind::Movie { "movies" } else { "series" };

        let media = Media::new(MediaGuid::new(Provider::Tvdb, kind, id.to_string()), id)
            .with_source_url(self.page_url(section, hit.slug.as_deref()))
            .with_title(title)
            .with_overview(overview)
            .with_image(first_present([hit.thumbnail, hit.image_url]))
            .with_air_date(air_date);

        Some((kind, media, hit.status))
    }

    fn movie_status(status: Option<&StatusRef>) -> Option<MovieStatus> {
        let status = status?;
        match status.id {
            Some(1) => Some(MovieStatus::Announced),
            Some(2) => Some(MovieStatus::InProduction),
            Some(3) => Some(MovieStatus::PostProduction),
            Some(4) => Some(MovieStatus::Completed),
            Some(5) => Some(MovieStatus::Released),
            _ => status.name.as_deref().and_then(MovieStatus::from_label),
        }
    }

    fn show_status(status: Option<&StatusRef>) -> Option<ShowStatus> {
        let status = status?;
        match status.id {
            Some(1) => Some(ShowStatus::Ongoing),
            Some(2) => Some(ShowStatus::Ended),
            Some(3) => Some(ShowStatus::Upcoming),
            _ => status.name.as_deref().and_then(ShowStatus::from_label),
        }
    }

    fn season_url(&self, slug: Option<&str>, number: u32) -> Option<String> {
        self.page_url("series", slug)
            .map(|base| format!("{base}/seasons/{}/{number}", self.season_type))
    }

    fn episode(&self, show: &MediaGuid, slug: Option<&str>, record: EpisodeRecord) -> Episode {
        let guid = show.season(record.season_number).episode(record.number);
        Episode::new(
            Media::new(guid, record.id)
                .with_source_url(
                    self.page_url("series", slug)
                        .map(|base| format!("{base}/episodes/{}", record.id)),
                )
                .with_title(record.name)
                .with_overview(record.overview)
                .with_image(first_present([record.image]))
                .with_air_date(parse_air_date(record.aired.as_deref())),
            record.number,
        )
        .with_runtime(record.runtime)
    }

    async fn episode_page(&self, id: u64, locale: Locale, page: u32) -> Result<Page<EpisodeRecord>> {
        let response: EpisodePage = self
            .request(
                CallRequest::get(format!(
                    "/series/{id}/episodes/{}/{}",
                    self.season_type,
                    locale.tvdb_code()
                ))
                .query("page", page),
            )
            .await?;

        let total_pages = response
            .links
            .map_or(1, |links| Page::<EpisodeRecord>::pages_for(links.total_items, links.page_size));
        debug!(series = id, page, total_pages, "TVDB episode page");

        Ok(Page::new(page, total_pages, response.data.episodes))
    }

    /// Episode listing grouped into one fragment per season
    async fn episode_fragments(
        &self,
        show: &MediaGuid,
        id: u64,
        slug: Option<&str>,
        locale: &Locale,
    ) -> Result<Vec<SeasonFragment>> {
        let records = self
            .fan_out
            .fetch_all_localized(0, locale, &self.fallback_locale, |locale, page| {
                self.episode_page(id, locale, page)
            })
            .await?;

        let mut by_season: BTreeMap<u32, Vec<Episode>> = BTreeMap::new();
        for record in records {
            by_season
                .entry(record.season_number)
                .or_default()
                .push(self.episode(show, slug, record));
        }

        Ok(by_season
            .into_iter()
            .map(|(number, episodes)| {
                let mut season = Season::new(show.season(number), number);
                season.source_url = self.season_url(slug, number);
                season.episodes = episodes;
                SeasonFragment::listing(season)
            })
            .collect())
    }
}

#[async_trait]
impl MetadataProvider for TvdbProvider {
    fn id(&self) -> Provider {
        Provider::Tvdb
    }

    fn name(&self) -> &'static str {
        "TheTVDB"
    }

    fn supported_kinds(&self) -> &[MediaKind] {
        &MediaKind::ALL
    }

    async fn search(
        &self,
        title: &str,
        kind: Option<MediaKind>,
        locale: &Locale,
    ) -> Result<SearchResult> {
        ensure_supported(self, kind)?;

        let mut request = CallRequest::get("/search").query("query", title);
        if let Some(kind) = kind {
            request = request.query("type", kind);
        }
        let response: Envelope<Vec<SearchHit>> = self.request(request).await?;

        let mut result = SearchResult::new(title);
        for hit in response.data {
            let Some((hit_kind, media, status)) = self.search_hit(hit, locale) else {
                continue;
            };
            if kind.is_some_and(|k| k != hit_kind) {
                continue;
            }
            match hit_kind {
                MediaKind::Movie => result.movies.push(
                    Movie::new(media).with_status(status.as_deref().and_then(MovieStatus::from_label)),
                ),
                MediaKind::Series => result.series.push(
                    Show::new(media).with_status(status.as_deref().and_then(ShowStatus::from_label)),
                ),
            }
        }

        if result.is_empty() {
            return Err(no_results(Provider::Tvdb, title));
        }
        Ok(result)
    }

    async fn get_movie(&self, guid: &MediaGuid, locale: &Locale) -> Result<Movie> {
        check_guid(Provider::Tvdb, guid, MediaKind::Movie)?;
        let id = numeric_id(guid)?;

        let response: Envelope<MovieExtended> = self
            .request(
                CallRequest::get(format!("/movies/{id}/extended"))
                    .query("meta", "translations")
                    .query("short", true),
            )
            .await
            .map_err(|e| lookup_error(e, guid))?;
        let movie = response.data;

        let translations = movie.translations.as_ref();
        let title = Self::translated(translations, locale, TranslationSet::name, movie.name);
        let overview = Self::translated(translations, locale, TranslationSet::overview, None);

        Ok(Movie::new(
            Media::new(guid.clone(), movie.id)
                .with_source_url(self.page_url("movies", movie.slug.as_deref()))
                .with_title(title)
                .with_overview(overview)
                .with_image(first_present([movie.image]))
                .with_air_date(parse_air_date(
                    movie.first_release.as_ref().and_then(|r| r.date.as_deref()),
                )),
        )
        .with_runtime(movie.runtime)
        .with_status(Self::movie_status(movie.status.as_ref())))
    }

    async fn get_show(
        &self,
        guid: &MediaGuid,
        locale: &Locale,
        include_episodes: bool,
    ) -> Result<Show> {
        check_guid(Provider::Tvdb, guid, MediaKind::Series)?;
        let id = numeric_id(guid)?;

        let response: Envelope<SeriesExtended> = self
            .request(
                CallRequest::get(format!("/series/{id}/extended"))
                    .query("meta", "translations")
                    .query("short", true),
            )
            .await
            .map_err(|e| lookup_error(e, guid))?;
        let series = response.data;
        let slug = series.slug.as_deref();

        let mut fragments: Vec<SeasonFragment> = series
            .seasons
            .iter()
            .filter(|s| {
                s.season_type
                    .as_ref()
                    .is_some_and(|t| t.kind.eq_ignore_ascii_case(self.season_type.as_str()))
            })
            .map(|record| {
                let mut season = Season::new(guid.season(record.number), record.number);
                season.source_id = Some(record.id);
                season.source_url = self.season_url(slug, record.number);
                season.image = first_present([record.image.clone()]);
                SeasonFragment::metadata(season)
            })
            .collect();

        if include_episodes {
            fragments.extend(self.episode_fragments(guid, id, slug, locale).await?);
        }

        let translations = series.translations.as_ref();
        let title = Self::translated(translations, locale, TranslationSet::name, series.name.clone());
        let overview = Self::translated(translations, locale, TranslationSet::overview, None);

        Ok(Show::new(
            Media::new(guid.clone(), series.id)
                .with_source_url(self.page_url("series", slug))
                .with_title(title)
                .with_overview(overview)
                .with_image(first_present([series.image.clone()]))
                .with_air_date(parse_air_date(series.first_aired.as_deref())),
        )
        .with_status(Self::show_status(series.status.as_ref()))
        .with_seasons(merge_seasons(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn provider() -> TvdbProvider {
        TvdbProvider::new(
            &ProviderContext::new(Client::new()),
            "key",
            Duration::from_secs(3600),
        )
    }

    fn hit(raw: serde_json::Value) -> SearchHit {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_search_hit_prefers_localized_translation() {
        let locale: Locale = "it-IT".parse().unwrap();
        let (kind, media, status) = provider()
            .search_hit(
                hit(serde_json::json!({
                    "tvdb_id": "81189",
                    "type": "series",
                    "name": "Breaking Bad",
                    "slug": "breaking-bad",
                    "translations": { "eng": "Breaking Bad", "ita": "Breaking Bad - Reazioni collaterali" },
                    "overviews": { "eng": "A chemistry professor turns to crime." },
                    "image_url": "https://artworks.thetvdb.com/banners/posters/81189-10.jpg",
                    "first_air_time": "2008-01-20",
                    "status": "Ended"
                })),
                &locale,
            )
            .unwrap();

        assert_eq!(kind, MediaKind::Series);
        assert_eq!(media.guid.to_string(), "tvdb://series/81189");
        assert_eq!(media.title.as_deref(), Some("Breaking Bad - Reazioni collaterali"));
        assert_eq!(media.overview.as_deref(), Some("A chemistry professor turns to crime."));
        assert_eq!(
            media.image.as_deref(),
            Some("https://artworks.thetvdb.com/banners/posters/81189-10.jpg")
        );
        assert_eq!(
            media.source_url.as_deref(),
            Some("https://thetvdb.com/series/breaking-bad")
        );
        assert_eq!(status.as_deref(), Some("Ended"));
    }

    #[test]
    fn test_search_hit_year_fallback_and_thumbnail() {
        let (kind, media, _) = provider()
            .search_hit(
                hit(serde_json::json!({
                    "tvdb_id": "169",
                    "type": "movie",
                    "name": "The Matrix",
                    "thumbnail": "https://artworks.thetvdb.com/movies/169/thumb.jpg",
                    "image_url": "https://artworks.thetvdb.com/movies/169/poster.jpg",
                    "year": "1999"
                })),
                &Locale::english(),
            )
            .unwrap();

        assert_eq!(kind, MediaKind::Movie);
        assert_eq!(media.air_date, NaiveDate::from_ymd_opt(1999, 1, 1));
        assert_eq!(
            media.image.as_deref(),
            Some("https://artworks.thetvdb.com/movies/169/thumb.jpg")
        );
        assert!(media.source_url.is_none());
    }

    #[test]
    fn test_search_hit_skips_other_types() {
        let person = hit(serde_json::json!({ "tvdb_id": "1", "type": "person", "name": "Bryan" }));
        let no_id = hit(serde_json::json!({ "tvdb_id": "series-x", "type": "series" }));

        assert!(provider().search_hit(person, &Locale::english()).is_none());
        assert!(provider().search_hit(no_id, &Locale::english()).is_none());
    }

    #[test]
    fn test_status_by_id_then_name() {
        let by_id = StatusRef { id: Some(1), name: None };
        let by_name = StatusRef { id: Some(99), name: Some("Continuing".to_string()) };

        assert_eq!(TvdbProvider::show_status(Some(&by_id)), Some(ShowStatus::Ongoing));
        assert_eq!(TvdbProvider::show_status(Some(&by_name)), Some(ShowStatus::Ongoing));
        assert_eq!(
            TvdbProvider::movie_status(Some(&StatusRef { id: Some(2), name: None })),
            Some(MovieStatus::InProduction)
        );
        assert_eq!(TvdbProvider::movie_status(None), None);
    }

    #[test]
    fn test_season_url_uses_season_type() {
        let tvdb = provider().with_season_type(SeasonType::Dvd);
        assert_eq!(
            tvdb.season_url(Some("breaking-bad"), 2).as_deref(),
            Some("https://thetvdb.com/series/breaking-bad/seasons/dvd/2")
        );
    }
}
