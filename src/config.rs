use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::{ApiError, Result},
    metadata::{
        Backoff, DEFAULT_MAX_RETRIES, FanOut, Locale, SUGGEST_API_URL, SeasonType, TMDB_API_URL,
        TMDB_IMAGE_URL, TMDB_SITE_URL, TVDB_API_URL, TVDB_SITE_URL,
    },
};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "ATLAS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/atlas.toml";
const ENV_PREFIX: &str = "ATLAS";
const ENV_SEPARATOR: &str = "__";

/// Application configuration.
///
/// Layered from built-in defaults, an optional TOML file and `ATLAS__*`
/// environment variables, in that order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub locale: LocaleConfig,
    pub tmdb: TmdbConfig,
    pub tvdb: TvdbConfig,
    pub suggest: SuggestConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
    /// Daily-rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info,tower_http=warn".to_string(),
            format: LogFormat::Text,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
    pub user_agent: String,
    /// Upper bound on concurrently fetched pages; 0 means unbounded
    pub max_concurrent_pages: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: 1000,
            backoff_jitter_ms: 1000,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            max_concurrent_pages: 0,
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_jitter_ms),
        )
    }

    #[must_use]
    pub const fn fan_out(&self) -> FanOut {
        FanOut::from_limit(self.max_concurrent_pages)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub metadata_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub max_entries: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: 24 * 60 * 60,
            session_ttl_secs: 60 * 60,
            max_entries: Some(10_000),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub primary: String,
    /// Locale a zero-result first page is retried in
    pub fallback: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            primary: "it-IT".to_string(),
            fallback: Locale::english().to_string(),
        }
    }
}

impl LocaleConfig {
    pub fn primary(&self) -> Result<Locale> {
        parse_locale("locale.primary", &self.primary)
    }

    pub fn fallback(&self) -> Result<Locale> {
        parse_locale("locale.fallback", &self.fallback)
    }
}

fn parse_locale(key: &str, value: &str) -> Result<Locale> {
    value
        .parse()
        .map_err(|e| ApiError::Config(format!("{key}: {e}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub site_url: String,
    pub image_url: String,
    pub poster_size: String,
    pub still_size: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: TMDB_API_URL.to_string(),
            site_url: TMDB_SITE_URL.to_string(),
            image_url: TMDB_IMAGE_URL.to_string(),
            poster_size: "original".to_string(),
            still_size: "original".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TvdbConfig {
    pub api_key: Option<String>,
    pub pin: Option<String>,
    pub api_url: String,
    pub site_url: String,
    pub season_type: SeasonType,
}

impl Default for TvdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            pin: None,
            api_url: TVDB_API_URL.to_string(),
            site_url: TVDB_SITE_URL.to_string(),
            season_type: SeasonType::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub enabled: bool,
    pub api_url: String,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: SUGGEST_API_URL.to_string(),
        }
    }
}

/// Treat unset and blank credentials alike
fn credential(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load from `$ATLAS_CONFIG` (or the default path) and the process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::load_with(Some(&path), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR)
    }

    /// Load from an optional file plus the given environment source
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.metadata_ttl_secs == 0 {
            return Err(ApiError::Config(
                "cache.metadata_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.session_ttl_secs == 0 {
            return Err(ApiError::Config(
                "cache.session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        self.locale.primary()?;
        self.locale.fallback()?;
        if self.http.timeout_secs == 0 {
            return Err(ApiError::Config(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn tmdb_api_key(&self) -> Option<&str> {
        credential(self.tmdb.api_key.as_ref())
    }

    #[must_use]
    pub fn tvdb_api_key(&self) -> Option<&str> {
        credential(self.tvdb.api_key.as_ref())
    }
}
