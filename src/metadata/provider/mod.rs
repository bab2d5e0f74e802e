mod http;
pub mod suggest;
pub mod tmdb;
mod traits;
pub mod tvdb;

pub use http::{Backoff, CallRequest, DEFAULT_MAX_RETRIES, HttpClient, build_client};
pub use suggest::SuggestProvider;
pub use tmdb::TmdbProvider;
pub use traits::MetadataProvider;
pub use tvdb::{SeasonType, TvdbProvider};

pub(crate) use traits::{check_guid, ensure_supported, lookup_error, no_results, numeric_id};

use crate::metadata::{FanOut, Locale};
use reqwest::Client;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

/// Dependencies shared by every adapter, owned by the process entry point
#[derive(Clone)]
pub struct ProviderContext {
    pub client: Client,
    pub max_retries: u32,
    pub backoff: Backoff,
    pub fan_out: FanOut,
    /// Locale a zero-result search is retried in
    pub fallback_locale: Locale,
}

impl ProviderContext {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            fan_out: FanOut::unbounded(),
            fallback_locale: Locale::english(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub const fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub fn with_fallback_locale(mut self, locale: Locale) -> Self {
        self.fallback_locale = locale;
        self
    }

    /// Resilient Caller rooted at `base_url` over the shared pool
    pub(crate) fn http(&self, base_url: &str) -> HttpClient {
        HttpClient::new(self.client.clone(), base_url).with_retry(self.max_retries, self.backoff)
    }
}

/// First candidate that is present and not blank
pub(crate) fn first_present<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty())
}

/// Decode a field, degrading a malformed value to `None`
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "lenient")]
        runtime: Option<u32>,
    }

    #[test]
    fn test_lenient_field_degrades_to_none() {
        let ok: Record = serde_json::from_str(r#"{"runtime": 47}"#).unwrap();
        let malformed: Record = serde_json::from_str(r#"{"runtime": "47 min"}"#).unwrap();
        let missing: Record = serde_json::from_str("{}").unwrap();

        assert_eq!(ok.runtime, Some(47));
        assert_eq!(malformed.runtime, None);
        assert_eq!(missing.runtime, None);
    }

    #[test]
    fn test_first_present_skips_blank() {
        let picked = first_present([None, Some("  ".to_string()), Some("Breaking Bad".to_string())]);
        assert_eq!(picked.as_deref(), Some("Breaking Bad"));
        assert_eq!(first_present([None, Some(String::new())]), None);
    }
}
