use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    ApiResponse, ApiResult, Ctx,
    error::ApiError,
    metadata::{
        Locale, MediaGuid, MediaKind, MediaRecord, Movie, Provider, ProviderResults, SearchResult,
        Show,
    },
};

/// Search request parameters
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 3, message = "Title must be at least 3 characters"))]
    pub title: String,
    /// movie or series; both when omitted
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub locale: Option<String>,
    /// Search a single provider instead of all of them
    pub provider: Option<Provider>,
}

/// One provider's results, or every provider's keyed by namespace
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Single(SearchResult),
    All(ProviderResults),
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub locale: Option<String>,
    /// Include the full episode listing
    #[serde(default)]
    pub episodes: bool,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub guid: String,
    pub locale: Option<String>,
}

/// Requested locale, or the service default
fn locale(ctx: &Ctx, requested: Option<&str>) -> Result<Locale, ApiError> {
    match requested.map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(ctx.metadata.default_locale().clone()),
    }
}

/// GET /api/search?title=...&type=...&locale=...&provider=...
async fn search(
    State(ctx): State<Ctx>,
    Query(mut params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    params.title = params.title.trim().to_string();
    params.validate()?;
    let locale = locale(&ctx, params.locale.as_deref())?;

    let response = match params.provider {
        Some(provider) => SearchResponse::Single(
            ctx.metadata
                .search(provider, &params.title, params.kind, &locale)
                .await?,
        ),
        None => SearchResponse::All(
            ctx.metadata
                .search_all(&params.title, params.kind, &locale)
                .await?,
        ),
    };

    Ok(ApiResponse::ok("Search completed", response))
}

/// GET /api/{provider}/movie/{id}
async fn get_movie(
    State(ctx): State<Ctx>,
    Path((provider, id)): Path<(Provider, String)>,
    Query(params): Query<LookupQuery>,
) -> ApiResult<Movie> {
    let locale = locale(&ctx, params.locale.as_deref())?;
    let movie = ctx
        .metadata
        .get_movie(&MediaGuid::movie(provider, id), &locale)
        .await?;

    Ok(ApiResponse::ok("Movie retrieved", movie))
}

/// GET /api/{provider}/series/{id}?episodes=true
async fn get_show(
    State(ctx): State<Ctx>,
    Path((provider, id)): Path<(Provider, String)>,
    Query(params): Query<ShowQuery>,
) -> ApiResult<Show> {
    let locale = locale(&ctx, params.locale.as_deref())?;
    let show = ctx
        .metadata
        .get_show(&MediaGuid::series(provider, id), &locale, params.episodes)
        .await?;

    Ok(ApiResponse::ok("Show retrieved", show))
}

/// GET /api/media?guid=tmdb://movie/603
async fn get_by_id(
    State(ctx): State<Ctx>,
    Query(params): Query<MediaQuery>,
) -> ApiResult<MediaRecord> {
    let guid: MediaGuid = params.guid.parse()?;
    let locale = locale(&ctx, params.locale.as_deref())?;
    let record = ctx.metadata.get_by_id(&guid, &locale).await?;

    Ok(ApiResponse::ok("Media retrieved", record))
}

/// POST /api/cache/clear
async fn clear_cache(State(ctx): State<Ctx>) -> ApiResponse<()> {
    ctx.metadata.clear_cache();
    ApiResponse::ok("Cache cleared", ())
}

/// Mount metadata routes
pub fn mount() -> Router<Ctx> {
    Router::new()
        .route("/search", get(search))
        .route("/media", get(get_by_id))
        .route("/cache/clear", post(clear_cache))
        .route("/{provider}/movie/{id}", get(get_movie))
        .route("/{provider}/series/{id}", get(get_show))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        metadata::{MetadataCache, MetadataService},
        routes,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = MetadataService::new(MetadataCache::new(Duration::from_secs(60), None));
        routes::router(Ctx::new(service, AppConfig::default()))
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["providers"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_short_title_rejected() {
        let (status, body) = call("/api/search?title=%20ab%20").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejected() {
        let (status, body) = call("/api/search?title=Matrix&provider=tmdb").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_bad_locale_and_guid_rejected() {
        let (status, _) = call("/api/tmdb/movie/603?locale=xx-YY").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call("/api/media?guid=not-a-guid").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
