use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod routes;

use crate::{
    config::AppConfig,
    error::ApiError,
    metadata::{
        MetadataCache, MetadataService, ProviderContext, SuggestProvider, TmdbProvider,
        TvdbProvider, build_client,
    },
};

/// Standard API response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Shared handler state
#[derive(Clone)]
pub struct Ctx {
    pub metadata: Arc<MetadataService>,
    pub config: Arc<AppConfig>,
}

impl Ctx {
    pub fn new(metadata: MetadataService, config: AppConfig) -> Self {
        Self {
            metadata: Arc::new(metadata),
            config: Arc::new(config),
        }
    }

    /// Wire the retrieval core from configuration.
    ///
    /// Providers without credentials are left unregistered; requests naming
    /// them are rejected as invalid.
    pub fn from_config(config: AppConfig) -> error::Result<Self> {
        let client = build_client(config.http.timeout(), &config.http.user_agent)?;
        let ctx = ProviderContext::new(client)
            .with_retry(config.http.max_retries, config.http.backoff())
            .with_fan_out(config.http.fan_out())
            .with_fallback_locale(config.locale.fallback()?);

        let cache = MetadataCache::new(config.cache.metadata_ttl(), config.cache.max_entries);
        let mut service = MetadataService::new(cache).with_default_locale(config.locale.primary()?);

        match config.tmdb_api_key() {
            Some(api_key) => service.add_provider(
                TmdbProvider::new(&ctx, api_key)
                    .with_api_url(&ctx, &config.tmdb.api_url)
                    .with_site_url(&config.tmdb.site_url)
                    .with_image_url(&config.tmdb.image_url)
                    .with_image_sizes(&config.tmdb.poster_size, &config.tmdb.still_size),
            ),
            None => warn!("TMDB API key not configured, provider disabled"),
        }

        match config.tvdb_api_key() {
            Some(api_key) => service.add_provider(
                TvdbProvider::new(&ctx, api_key, config.cache.session_ttl())
                    .with_pin(config.tvdb.pin.clone())
                    .with_api_url(&ctx, &config.tvdb.api_url)
                    .with_site_url(&config.tvdb.site_url)
                    .with_season_type(config.tvdb.season_type),
            ),
            None => warn!("TVDB API key not configured, provider disabled"),
        }

        if config.suggest.enabled {
            service.add_provider(SuggestProvider::new(&ctx).with_api_url(&ctx, &config.suggest.api_url));
        }

        info!(
            providers = service.providers().count(),
            locale = %service.default_locale(),
            "Metadata service ready"
        );
        Ok(Self::new(service, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Provider;

    #[test]
    fn test_providers_registered_from_credentials() {
        let mut config = AppConfig::default();
        config.tvdb.api_key = Some("tvdb-key".to_string());

        let ctx = Ctx::from_config(config).unwrap();
        let providers: Vec<Provider> = ctx.metadata.providers().collect();

        assert_eq!(providers, vec![Provider::Tvdb, Provider::Imdb]);
        assert_eq!(ctx.metadata.default_locale().to_string(), "it-IT");
    }

    #[test]
    fn test_suggest_can_be_disabled() {
        let mut config = AppConfig::default();
        config.suggest.enabled = false;

        let ctx = Ctx::from_config(config).unwrap();
        assert_eq!(ctx.metadata.providers().count(), 0);
    }
}
