use crate::metadata::{
    CacheKey, Locale, MediaGuid, MediaKind, MetadataCache, MetadataError, Provider, Result,
    provider::MetadataProvider,
    types::{MediaRecord, Movie, SearchResult, Show},
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Search results keyed by the provider that produced them
pub type ProviderResults = BTreeMap<Provider, SearchResult>;

/// Entry point of the retrieval core: routes calls to the registered
/// adapters and serves repeated calls from the cache
#[derive(Clone)]
pub struct MetadataService {
    providers: BTreeMap<Provider, Arc<dyn MetadataProvider>>,
    cache: MetadataCache,
    default_locale: Locale,
}

impl MetadataService {
    pub fn new(cache: MetadataCache) -> Self {
        Self {
            providers: BTreeMap::new(),
            cache,
            default_locale: Locale::default(),
        }
    }

    #[must_use]
    pub fn with_default_locale(mut self, locale: Locale) -> Self {
        self.default_locale = locale;
        self
    }

    /// Register an adapter, replacing any previous one for the same namespace
    pub fn add_provider<P: MetadataProvider + 'static>(&mut self, provider: P) {
        info!(provider = %provider.id(), name = provider.name(), "Registering metadata provider");
        self.providers.insert(provider.id(), Arc::new(provider));
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.providers.keys().copied()
    }

    #[must_use]
    pub const fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    #[must_use]
    pub const fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    fn provider(&self, id: Provider) -> Result<&Arc<dyn MetadataProvider>> {
        self.providers
            .get(&id)
            .ok_or_else(|| MetadataError::Validation(format!("Provider not configured: {id}")))
    }

    fn lookup_provider(&self, guid: &MediaGuid, kind: MediaKind) -> Result<&Arc<dyn MetadataProvider>> {
        let provider = self.provider(guid.provider())?;
        if !provider.supports_lookup() {
            return Err(MetadataError::Validation(format!(
                "{} does not support lookups",
                guid.provider()
            )));
        }
        if guid.kind() != kind || !guid.is_top_level() {
            return Err(MetadataError::Validation(format!(
                "{guid} is not a {kind} identifier"
            )));
        }
        Ok(provider)
    }

    /// Search one provider. Each kind's hits are cached as a list of child
    /// GUIDs with every child stored under its own key; concurrent identical
    /// searches share one upstream call.
    pub async fn search(
        &self,
        id: Provider,
        title: &str,
        kind: Option<MediaKind>,
        locale: &Locale,
    ) -> Result<SearchResult> {
        let provider = self.provider(id)?;
        let kinds: Vec<MediaKind> = match kind {
            Some(kind) if !provider.supported_kinds().contains(&kind) => {
                return Err(MetadataError::Validation(format!(
                    "{id} does not support {kind} searches"
                )));
            }
            Some(kind) => vec![kind],
            None => provider.supported_kinds().to_vec(),
        };
        let keys: Vec<CacheKey> = kinds
            .iter()
            .map(|k| CacheKey::search(id, *k, locale, title))
            .collect();

        let mut result = match self.cache.get_searches(&keys).await {
            Some(cached) => {
                debug!(provider = %id, query = title, hits = cached.len(), "Search served from cache");
                cached
            }
            None => {
                self.cache
                    .search_or_fill(&keys, async {
                        info!(provider = %id, query = title, kind = ?kind, locale = %locale, "Searching provider");
                        provider.search(title, kind, locale).await
                    })
                    .await?
            }
        };

        if result.is_empty() {
            return Err(MetadataError::NotFound(format!("No {id} results for: {title}")));
        }
        result.query = title.to_string();
        Ok(result)
    }

    /// Search every registered provider concurrently.
    ///
    /// Failing providers are logged and left out. When none produced results
    /// the last failure is surfaced, or `NotFound` if all simply had no hits.
    pub async fn search_all(
        &self,
        title: &str,
        kind: Option<MediaKind>,
        locale: &Locale,
    ) -> Result<ProviderResults> {
        let searches = self
            .providers
            .iter()
            .filter(|(_, p)| kind.is_none_or(|k| p.supported_kinds().contains(&k)))
            .map(|(id, _)| async move { (*id, self.search(*id, title, kind, locale).await) });

        let mut results = ProviderResults::new();
        let mut last_error = None;
        for (id, outcome) in join_all(searches).await {
            match outcome {
                Ok(result) => {
                    results.insert(id, result);
                }
                Err(MetadataError::NotFound(_)) => {
                    debug!(provider = %id, query = title, "Provider returned no results");
                }
                Err(err) => {
                    warn!(provider = %id, query = title, error = %err, "Provider search failed");
                    last_error = Some(err);
                }
            }
        }

        if results.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| MetadataError::NotFound(format!("No results for: {title}"))));
        }
        Ok(results)
    }

    pub async fn get_movie(&self, guid: &MediaGuid, locale: &Locale) -> Result<Movie> {
        let provider = self.lookup_provider(guid, MediaKind::Movie)?;
        self.cache
            .movie_or_fill(guid, provider.get_movie(guid, locale))
            .await
    }

    pub async fn get_show(
        &self,
        guid: &MediaGuid,
        locale: &Locale,
        include_episodes: bool,
    ) -> Result<Show> {
        let provider = self.lookup_provider(guid, MediaKind::Series)?;
        self.cache
            .show_or_fill(
                guid,
                include_episodes,
                provider.get_show(guid, locale, include_episodes),
            )
            .await
    }

    /// Lookup dispatched on the GUID's kind
    pub async fn get_by_id(&self, guid: &MediaGuid, locale: &Locale) -> Result<MediaRecord> {
        match guid.kind() {
            MediaKind::Movie => self.get_movie(guid, locale).await.map(MediaRecord::Movie),
            MediaKind::Series => self
                .get_show(guid, locale, false)
                .await
                .map(MediaRecord::Show),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
