use super::api_types::{
    EpisodeResult, MovieDetails, MovieResult, SearchResponse, SeasonDetails, SeasonSummary,
    Translations, TvDetails, TvResult,
};
use crate::metadata::{
    FanOut, Locale, MediaGuid, MediaKind, Page, Provider, Result,
    merge::{SeasonFragment, merge_seasons},
    provider::{
        CallRequest, HttpClient, MetadataProvider, ProviderContext, check_guid, ensure_supported,
        first_present, lookup_error, no_results, numeric_id,
    },
    types::{Episode, Media, Movie, MovieStatus, SearchResult, Season, Show, ShowStatus, parse_air_date},
};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

pub const TMDB_API_URL: &str = "https://api.themoviedb.org/3";
pub const TMDB_SITE_URL: &str = "https://www.themoviedb.org";
pub const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p";

const CALLER: &str = "TMDB";

pub struct TmdbProvider {
    client: HttpClient,
    api_key: String,
    fan_out: FanOut,
    fallback_locale: Locale,
    site_url: String,
    image_url: String,
    poster_size: String,
    still_size: String,
}

impl TmdbProvider {
    pub fn new(ctx: &ProviderContext, api_key: impl Into<String>) -> Self {
        Self {
            client: ctx.http(TMDB_API_URL),
            api_key: api_key.into(),
            fan_out: ctx.fan_out,
            fallback_locale: ctx.fallback_locale.clone(),
            site_url: TMDB_SITE_URL.to_string(),
            image_url: TMDB_IMAGE_URL.to_string(),
            poster_size: "original".to_string(),
            still_size: "original".to_string(),
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

    #[must_use]
    pub fn with_image_url(mut self, image_url: &str) -> Self {
        self.image_url = image_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_image_sizes(mut self, poster: impl Into<String>, still: impl Into<String>) -> Self {
        self.poster_size = poster.into();
        self.still_size = still.into();
        self
    }

    /// `<image_url>/<size><path>`; a missing or blank path yields `None`
    fn image(&self, path: Option<&str>, size: &str) -> Option<String> {
        let path = path.map(str::trim).filter(|p| !p.is_empty())?;
        let separator = if path.starts_with('/') { "" } else { "/" };
        Some(format!("{}/{size}{separator}{path}", self.image_url))
    }

    fn poster(&self, path: Option<&str>) -> Option<String> {
        self.image(path, &self.poster_size)
    }

    async fn request<T: DeserializeOwned>(&self, request: CallRequest) -> Result<T> {
        let request = request.caller(CALLER).query("api_key", &self.api_key);
        self.client.call_json(&request).await
    }

    async fn search_page<T: DeserializeOwned>(
        &self,
        kind: MediaKind,
        title: &str,
        locale: Locale,
        page: u32,
    ) -> Result<Page<T>> {
        let endpoint = match kind {
            MediaKind::Movie => "/search/movie",
            MediaKind::Series => "/search/tv",
        };
        let response: SearchResponse<T> = self
            .request(
                CallRequest::get(endpoint)
                    .query("language", locale.tmdb_tag())
                    .query("query", title)
                    .query("page", page)
                    .query("include_adult", false),
            )
            .await?;

        debug!(
            kind = %kind,
            locale = %locale,
            page,
            total_pages = response.total_pages,
            total_results = response.total_results,
            "TMDB search page"
        );
        Ok(Page::new(page, response.total_pages, response.results))
    }

    async fn search_movies(&self, title: &str, locale: &Locale) -> Result<Vec<Movie>> {
        let results: Vec<MovieResult> = self
            .fan_out
            .fetch_all_localized(1, locale, &self.fallback_locale, |locale, page| {
                self.search_page(MediaKind::Movie, title, locale, page)
            })
            .await?;

        Ok(results.into_iter().map(|m| self.movie_result(m)).collect())
    }

    async fn search_series(&self, title: &str, locale: &Locale) -> Result<Vec<Show>> {
        let results: Vec<TvResult> = self
            .fan_out
            .fetch_all_localized(1, locale, &self.fallback_locale, |locale, page| {
                self.search_page(MediaKind::Series, title, locale, page)
            })
            .await?;

        Ok(results.into_iter().map(|t| self.tv_result(t)).collect())
    }

    fn movie_result(&self, movie: MovieResult) -> Movie {
        let guid = MediaGuid::movie(Provider::Tmdb, movie.id.to_string());
        Movie::new(
            Media::new(guid, movie.id)
                .with_source_url(Some(format!("{}/movie/{}", self.site_url, movie.id)))
                .with_title(first_present([movie.title, movie.original_title]))
                .with_overview(movie.overview)
                .with_image(self.poster(movie.poster_path.as_deref()))
                .with_air_date(parse_air_date(movie.release_date.as_deref())),
        )
    }

    fn tv_result(&self, tv: TvResult) -> Show {
        let guid = MediaGuid::series(Provider::Tmdb, tv.id.to_string());
        Show::new(
            Media::new(guid, tv.id)
                .with_source_url(Some(format!("{}/tv/{}", self.site_url, tv.id)))
                .with_title(first_present([tv.name, tv.original_name]))
                .with_overview(tv.overview)
                .with_image(self.poster(tv.poster_path.as_deref()))
                .with_air_date(parse_air_date(tv.first_air_date.as_deref())),
        )
    }

    /// Localized translation, then the localized payload, then English,
    /// then the original-language field
    fn pick_text(
        translations: Option<&Translations>,
        locale: &Locale,
        localized: Option<String>,
        original: Option<String>,
        field: impl Fn(&super::api_types::TranslationData) -> Option<String>,
    ) -> Option<String> {
        let translated = |language: &str| {
            translations
                .and_then(|t| t.for_language(language))
                .and_then(&field)
        };
        first_present([translated(locale.language()), localized, translated("en"), original])
    }

    fn movie_details(&self, movie: MovieDetails, locale: &Locale) -> Movie {
        let translations = movie.translations.as_ref();
        let title = Self::pick_text(
            translations,
            locale,
            movie.title,
            movie.original_title,
            |d| d.title.clone(),
        );
        let overview = Self::pick_text(translations, locale, movie.overview, None, |d| {
            d.overview.clone()
        });

        let guid = MediaGuid::movie(Provider::Tmdb, movie.id.to_string());
        Movie::new(
            Media::new(guid, movie.id)
                .with_source_url(Some(format!("{}/movie/{}", self.site_url, movie.id)))
                .with_title(title)
                .with_overview(overview)
                .with_image(self.poster(movie.poster_path.as_deref()))
                .with_air_date(parse_air_date(movie.release_date.as_deref())),
        )
        .with_runtime(movie.runtime)
        .with_status(movie.status.as_deref().and_then(MovieStatus::from_label))
    }

    fn season_summary(&self, show: &MediaGuid, show_id: u64, summary: SeasonSummary) -> Season {
        let number = summary.season_number;
        Season {
            source_id: summary.id,
            source_url: Some(format!("{}/tv/{show_id}/season/{number}", self.site_url)),
            title: first_present([summary.name]),
            overview: first_present([summary.overview]),
            image: self.poster(summary.poster_path.as_deref()),
            air_date: parse_air_date(summary.air_date.as_deref()),
            ..Season::new(show.season(number), number)
        }
    }

    fn episode(&self, show: &MediaGuid, show_id: u64, season: u32, episode: EpisodeResult) -> Episode {
        let number = episode.episode_number;
        let guid = show.season(season).episode(number);
        Episode::new(
            Media::new(guid, episode.id)
                .with_source_url(Some(format!(
                    "{}/tv/{show_id}/season/{season}/episode/{number}",
                    self.site_url
                )))
                .with_title(episode.name)
                .with_overview(episode.overview)
                .with_image(self.image(episode.still_path.as_deref(), &self.still_size))
                .with_air_date(parse_air_date(episode.air_date.as_deref())),
            number,
        )
        .with_runtime(episode.runtime)
    }

    async fn season_page(
        &self,
        show_id: u64,
        number: u32,
        locale: &Locale,
        page: u32,
    ) -> Result<SeasonDetails> {
        self.request(
            CallRequest::get(format!("/tv/{show_id}/season/{number}"))
                .query("language", locale.tmdb_tag())
                .query("page", page),
        )
        .await
    }

    /// One season with every episode page fetched
    async fn season_tree(
        &self,
        show: &MediaGuid,
        show_id: u64,
        number: u32,
        locale: &Locale,
    ) -> Result<Season> {
        let mut details = self.season_page(show_id, number, locale, 1).await?;
        let first = Page::new(1, details.total_pages, std::mem::take(&mut details.episodes));

        let episodes = self
            .fan_out
            .fetch_all(first, |page| async move {
                let details = self.season_page(show_id, number, locale, page).await?;
                Ok(Page::new(page, details.total_pages, details.episodes))
            })
            .await?;

        let mut season = self.season_summary(
            show,
            show_id,
            SeasonSummary {
                id: details.id,
                season_number: number,
                name: details.name,
                overview: details.overview,
                poster_path: details.poster_path,
                air_date: details.air_date,
            },
        );
        season.episodes = episodes
            .into_iter()
            .map(|episode| self.episode(show, show_id, number, episode))
            .collect();
        Ok(season)
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn id(&self) -> Provider {
        Provider::Tmdb
    }

    fn name(&self) -> &'static str {
        "The Movie Database"
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

        let mut result = SearchResult::new(title);
        match kind {
            Some(MediaKind::Movie) => result.movies = self.search_movies(title, locale).await?,
            Some(MediaKind::Series) => result.series = self.search_series(title, locale).await?,
            None => {
                let (movies, series) = tokio::try_join!(
                    self.search_movies(title, locale),
                    self.search_series(title, locale)
                )?;
                result.movies = movies;
                result.series = series;
            }
        }

        if result.is_empty() {
            return Err(no_results(Provider::Tmdb, title));
        }

        info!(query = title, movies = result.movies.len(), series = result.series.len(), "TMDB search done");
        Ok(result)
    }

    async fn get_movie(&self, guid: &MediaGuid, locale: &Locale) -> Result<Movie> {
        check_guid(Provider::Tmdb, guid, MediaKind::Movie)?;
        let id = numeric_id(guid)?;

        let details: MovieDetails = self
            .request(
                CallRequest::get(format!("/movie/{id}"))
                    .query("language", locale.tmdb_tag())
                    .query("append_to_response", "translations"),
            )
            .await
            .map_err(|e| lookup_error(e, guid))?;

        Ok(self.movie_details(details, locale))
    }

    async fn get_show(
        &self,
        guid: &MediaGuid,
        locale: &Locale,
        include_episodes: bool,
    ) -> Result<Show> {
        check_guid(Provider::Tmdb, guid, MediaKind::Series)?;
        let id = numeric_id(guid)?;

        let mut tv: TvDetails = self
            .request(
                CallRequest::get(format!("/tv/{id}"))
                    .query("language", locale.tmdb_tag())
                    .query("append_to_response", "translations"),
            )
            .await
            .map_err(|e| lookup_error(e, guid))?;

        let summaries = std::mem::take(&mut tv.seasons);
        let numbers: Vec<u32> = summaries.iter().map(|s| s.season_number).collect();

        let mut fragments: Vec<SeasonFragment> = summaries
            .into_iter()
            .map(|s| SeasonFragment::metadata(self.season_summary(guid, id, s)))
            .collect();

        if include_episodes {
            let trees = try_join_all(
                numbers
                    .iter()
                    .map(|number| self.season_tree(guid, id, *number, locale)),
            )
            .await?;
            fragments.extend(trees.into_iter().map(SeasonFragment::listing));
        }

        let translations = tv.translations.as_ref();
        let title = Self::pick_text(translations, locale, tv.name, tv.original_name, |d| {
            d.name.clone()
        });
        let overview =
            Self::pick_text(translations, locale, tv.overview, None, |d| d.overview.clone());

        Ok(Show::new(
            Media::new(guid.clone(), id)
                .with_source_url(Some(format!("{}/tv/{id}", self.site_url)))
                .with_title(title)
                .with_overview(overview)
                .with_image(self.poster(tv.poster_path.as_deref()))
                .with_air_date(parse_air_date(tv.first_air_date.as_deref())),
        )
        .with_status(tv.status.as_deref().and_then(ShowStatus::from_label))
        .with_seasons(merge_seasons(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn provider() -> TmdbProvider {
        TmdbProvider::new(&ProviderContext::new(Client::new()), "key")
    }

    #[test]
    fn test_image_url_building() {
        let tmdb = provider();

        assert_eq!(
            tmdb.poster(Some("/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg")).as_deref(),
            Some("https://image.tmdb.org/t/p/original/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg")
        );
        assert_eq!(tmdb.poster(None), None);
        assert_eq!(tmdb.poster(Some("")), None);

        let small = provider().with_image_sizes("w500", "w300");
        assert_eq!(
            small.image(Some("still.jpg"), &small.still_size).as_deref(),
            Some("https://image.tmdb.org/t/p/w300/still.jpg")
        );
    }

    #[test]
    fn test_movie_details_title_chain() {
        let tmdb = provider();
        let locale: Locale = "it-IT".parse().unwrap();
        let details: MovieDetails = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "",
            "original_title": "The Matrix",
            "overview": "",
            "release_date": "1999-03-30",
            "runtime": 136,
            "status": "Released",
            "translations": { "translations": [
                { "iso_639_1": "en", "data": { "title": "The Matrix", "overview": "Set in the 22nd century." } }
            ]}
        }))
        .unwrap();

        let movie = tmdb.movie_details(details, &locale);

        assert_eq!(movie.media.title.as_deref(), Some("The Matrix"));
        assert_eq!(movie.media.overview.as_deref(), Some("Set in the 22nd century."));
        assert_eq!(movie.media.guid.to_string(), "tmdb://movie/603");
        assert_eq!(movie.status, Some(MovieStatus::Released));
        assert_eq!(movie.runtime, Some(136));
        assert_eq!(
            movie.media.source_url.as_deref(),
            Some("https://www.themoviedb.org/movie/603")
        );
    }

    #[test]
    fn test_rumored_movie_is_announced() {
        let details: MovieDetails =
            serde_json::from_value(serde_json::json!({ "id": 1, "status": "Rumored" })).unwrap();

        let movie = provider().movie_details(details, &Locale::english());

        assert_eq!(movie.status, Some(MovieStatus::Announced));
        assert!(movie.media.title.is_none());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let tmdb = provider();
        let raw = serde_json::json!({
            "id": 1396,
            "name": "Breaking Bad",
            "poster_path": "/ggFHVNu6YYI5L9pCfOacjizRGt.jpg",
            "first_air_date": "2008-01-20"
        });

        let first = tmdb.tv_result(serde_json::from_value(raw.clone()).unwrap());
        let second = tmdb.tv_result(serde_json::from_value(raw).unwrap());

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
