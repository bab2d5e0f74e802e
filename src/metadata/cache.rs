use crate::metadata::{
    Locale, MediaGuid, MediaKind, MetadataError, Provider, Result,
    types::{Movie, SearchResult, Show},
};
use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Stored payload plus the moment it was filled
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    filled_at: Instant,
    payload: V,
}

impl<V> CacheEntry<V> {
    fn new(payload: V) -> Self {
        Self {
            filled_at: Instant::now(),
            payload,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.filled_at.elapsed() < ttl
    }
}

/// Key-value store with lazy expiry and coalesced fills.
///
/// An entry is valid iff `now - filled_at < ttl`. Expired entries are never
/// swept; they read as misses and get replaced by the next fill or put.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    inner: Cache<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `max_entries` bounds memory with size-based eviction; `None` is unbounded
    pub fn new(name: &'static str, ttl: Duration, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name);
        if let Some(max) = max_entries {
            builder = builder.max_capacity(max);
        }

        Self {
            name,
            ttl,
            inner: builder.build(),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.inner.get(key).await?;
        if entry.is_fresh(self.ttl) {
            debug!(cache = self.name, key = %key, "Cache hit");
            Some(entry.payload)
        } else {
            debug!(cache = self.name, key = %key, "Cache entry expired");
            None
        }
    }

    /// Last write wins
    pub async fn put(&self, key: K, value: V) {
        self.inner.insert(key, CacheEntry::new(value)).await;
    }

    pub async fn remove(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    /// Return the fresh value under `key`, or run `fill` to produce it.
    ///
    /// Concurrent callers missing on the same key share a single `fill`;
    /// a failed fill is not cached and its error reaches every waiter.
    pub async fn get_or_try_fill<F>(&self, key: K, fill: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        if let Some(entry) = self.inner.get(&key).await {
            if entry.is_fresh(self.ttl) {
                debug!(cache = self.name, key = %key, "Cache hit");
                return Ok(entry.payload);
            }
            self.inner.invalidate(&key).await;
        }

        debug!(cache = self.name, key = %key, "Cache miss, filling");
        self.inner
            .try_get_with(key, async { fill.await.map(CacheEntry::new) })
            .await
            .map(|entry| entry.payload)
            .map_err(Arc::unwrap_or_clone)
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

/// Typed key for the metadata cache; `Display` yields the wire form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Movie or show record, possibly a search summary
    Media(MediaGuid),
    /// Show with its full season and episode tree
    ShowTree(MediaGuid),
    /// Child GUIDs of a search
    Search {
        provider: Provider,
        kind: MediaKind,
        locale: Locale,
        title: String,
    },
}

impl CacheKey {
    pub fn search(provider: Provider, kind: MediaKind, locale: &Locale, title: &str) -> Self {
        Self::Search {
            provider,
            kind,
            locale: locale.clone(),
            title: normalize_title(title),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Media(guid) => write!(f, "{guid}"),
            Self::ShowTree(guid) => write!(f, "{guid}/seasons"),
            Self::Search {
                provider,
                kind,
                locale,
                title,
            } => write!(f, "{provider}:search/{kind}/{title}@{locale}"),
        }
    }
}

/// Lowercased, trimmed, inner whitespace collapsed
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Movie(Movie),
    Show(Show),
    Guids(Vec<MediaGuid>),
}

/// Metadata cache: records by GUID plus search-result indirection
#[derive(Clone)]
pub struct MetadataCache {
    entries: TtlCache<CacheKey, CachedValue>,
    /// Searches being filled; entries are stale as soon as they land, so only
    /// concurrent callers ever share one
    searches_in_flight: TtlCache<String, SearchResult>,
}

impl MetadataCache {
    pub fn new(ttl: Duration, max_entries: Option<u64>) -> Self {
        Self {
            entries: TtlCache::new("metadata", ttl, max_entries),
            searches_in_flight: TtlCache::new("search-in-flight", Duration::ZERO, None),
        }
    }

    pub async fn get_movie(&self, guid: &MediaGuid) -> Option<Movie> {
        match self.entries.get(&CacheKey::Media(guid.clone())).await? {
            CachedValue::Movie(movie) => Some(movie),
            _ => None,
        }
    }

    pub async fn put_movie(&self, movie: Movie) {
        let key = CacheKey::Media(movie.media.guid.clone());
        self.entries.put(key, CachedValue::Movie(movie)).await;
    }

    /// A cached full tree also satisfies a request without episodes
    pub async fn get_show(&self, guid: &MediaGuid, include_episodes: bool) -> Option<Show> {
        if let Some(CachedValue::Show(tree)) =
            self.entries.get(&CacheKey::ShowTree(guid.clone())).await
        {
            return Some(tree);
        }
        if include_episodes {
            return None;
        }
        match self.entries.get(&CacheKey::Media(guid.clone())).await? {
            CachedValue::Show(show) => Some(show),
            _ => None,
        }
    }

    pub async fn put_show(&self, show: Show, include_episodes: bool) {
        let guid = show.media.guid.clone();
        let key = if include_episodes {
            CacheKey::ShowTree(guid)
        } else {
            CacheKey::Media(guid)
        };
        self.entries.put(key, CachedValue::Show(show)).await;
    }

    /// Coalesced movie lookup
    pub async fn movie_or_fill<F>(&self, guid: &MediaGuid, fill: F) -> Result<Movie>
    where
        F: Future<Output = Result<Movie>>,
    {
        let key = CacheKey::Media(guid.clone());
        match self
            .entries
            .get_or_try_fill(key, async { fill.await.map(CachedValue::Movie) })
            .await?
        {
            CachedValue::Movie(movie) => Ok(movie),
            _ => Err(mismatch(guid)),
        }
    }

    /// Coalesced show lookup
    pub async fn show_or_fill<F>(&self, guid: &MediaGuid, include_episodes: bool, fill: F) -> Result<Show>
    where
        F: Future<Output = Result<Show>>,
    {
        if let Some(show) = self.get_show(guid, include_episodes).await {
            return Ok(show);
        }

        let key = if include_episodes {
            CacheKey::ShowTree(guid.clone())
        } else {
            CacheKey::Media(guid.clone())
        };
        match self
            .entries
            .get_or_try_fill(key, async { fill.await.map(CachedValue::Show) })
            .await?
        {
            CachedValue::Show(show) => Ok(show),
            _ => Err(mismatch(guid)),
        }
    }

    /// Rebuild a search from its GUID list; any evicted child makes it a miss
    pub async fn get_search(&self, key: &CacheKey) -> Option<SearchResult> {
        let CachedValue::Guids(guids) = self.entries.get(key).await? else {
            return None;
        };
        let CacheKey::Search { title, .. } = key else {
            return None;
        };

        let mut result = SearchResult::new(title.clone());
        for guid in &guids {
            match self.entries.get(&CacheKey::Media(guid.clone())).await? {
                CachedValue::Movie(movie) => result.movies.push(movie),
                CachedValue::Show(show) => result.series.push(show),
                CachedValue::Guids(_) => return None,
            }
        }
        Some(result)
    }

    /// A hit only when every partition is cached
    pub async fn get_searches(&self, keys: &[CacheKey]) -> Option<SearchResult> {
        let mut combined = SearchResult::default();
        for key in keys {
            combined.extend(self.get_search(key).await?);
        }
        Some(combined)
    }

    /// Coalesced search over one or more per-kind partitions.
    ///
    /// Concurrent callers asking for the same partitions share one `fill`.
    /// Its result is split by kind and every partition stored before the
    /// waiters are released.
    pub async fn search_or_fill<F>(&self, keys: &[CacheKey], fill: F) -> Result<SearchResult>
    where
        F: Future<Output = Result<SearchResult>>,
    {
        let flight = keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("+");

        let outcome = self
            .searches_in_flight
            .get_or_try_fill(flight.clone(), async {
                // A fill that finished between our miss and joining the flight
                if let Some(hit) = self.get_searches(keys).await {
                    return Ok(hit);
                }

                let result = fill.await?;
                for key in keys {
                    let CacheKey::Search { kind, .. } = key else {
                        continue;
                    };
                    let mut partition = SearchResult::new(result.query.clone());
                    match kind {
                        MediaKind::Movie => partition.movies.clone_from(&result.movies),
                        MediaKind::Series => partition.series.clone_from(&result.series),
                    }
                    self.put_search(key.clone(), &partition).await;
                }
                Ok(result)
            })
            .await;

        self.searches_in_flight.remove(&flight).await;
        outcome
    }

    /// Store every hit under its own GUID, then the GUID list under `key`
    pub async fn put_search(&self, key: CacheKey, result: &SearchResult) {
        for movie in &result.movies {
            self.put_movie(movie.clone()).await;
        }
        for show in &result.series {
            self.put_show(show.clone(), false).await;
        }
        self.entries
            .put(key, CachedValue::Guids(result.guids()))
            .await;
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.searches_in_flight.clear();
    }
}

fn mismatch(guid: &MediaGuid) -> MetadataError {
    MetadataError::Validation(format!("Cached record for {guid} has a different media kind"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::Media;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn movie(id: &str, title: &str) -> Movie {
        Movie::new(
            Media::new(MediaGuid::movie(Provider::Tmdb, id), id.parse().unwrap())
                .with_title(Some(title.to_string())),
        )
    }

    fn cache(ttl_secs: u64) -> TtlCache<String, u32> {
        TtlCache::new("test", Duration::from_secs(ttl_secs), Some(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_put_within_ttl() {
        let cache = cache(60);
        cache.put("key".to_string(), 7).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_is_miss() {
        let cache = cache(60);
        cache.put("key".to_string(), 7).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_put_put_last_write_wins() {
        let cache = cache(60);
        cache.put("key".to_string(), 1).await;
        cache.put("key".to_string(), 2).await;

        assert_eq!(cache.get(&"key".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_value() {
        let cache = cache(60);
        let (a, b) = (cache.clone(), cache.clone());

        tokio::join!(a.put("key".to_string(), 1), b.put("key".to_string(), 2));

        let value = cache.get(&"key".to_string()).await;
        assert!(matches!(value, Some(1 | 2)));
    }

    #[tokio::test]
    async fn test_concurrent_fills_are_coalesced() {
        let cache = cache(60);
        let fills = Arc::new(AtomicU32::new(0));

        let fill = |fills: Arc<AtomicU32>| async move {
            fills.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(42)
        };

        let (first, second) = tokio::join!(
            cache.get_or_try_fill("key".to_string(), fill(Arc::clone(&fills))),
            cache.get_or_try_fill("key".to_string(), fill(Arc::clone(&fills))),
        );

        assert_eq!(first.unwrap(), 42);
        assert_eq!(second.unwrap(), 42);
        assert_eq!(fills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refilled() {
        let cache = cache(60);
        cache.put("key".to_string(), 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let value = cache
            .get_or_try_fill("key".to_string(), async { Ok(2) })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(cache.get(&"key".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn test_failed_fill_is_not_cached() {
        let cache = cache(60);

        let err = cache
            .get_or_try_fill("key".to_string(), async {
                Err(MetadataError::UpstreamStatus {
                    status: 503,
                    message: None,
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[test]
    fn test_cache_key_wire_form() {
        let guid = MediaGuid::series(Provider::Tvdb, "81189");
        assert_eq!(CacheKey::Media(guid.clone()).to_string(), "tvdb://series/81189");
        assert_eq!(
            CacheKey::ShowTree(guid).to_string(),
            "tvdb://series/81189/seasons"
        );

        let locale: Locale = "it-IT".parse().unwrap();
        let key = CacheKey::search(Provider::Tmdb, MediaKind::Movie, &locale, "  The   Matrix ");
        assert_eq!(key.to_string(), "tmdb:search/movie/the matrix@it-IT");
    }

    #[tokio::test]
    async fn test_search_indirection_reuses_children() {
        let cache = MetadataCache::new(Duration::from_secs(3600), None);
        let locale = Locale::english();
        let key = CacheKey::search(Provider::Tmdb, MediaKind::Movie, &locale, "Matrix");

        let mut result = SearchResult::new("matrix");
        result.movies = vec![movie("603", "The Matrix"), movie("604", "The Matrix Reloaded")];
        cache.put_search(key.clone(), &result).await;

        // Direct lookup by id is served by the search's child entry.
        let child = cache
            .get_movie(&MediaGuid::movie(Provider::Tmdb, "604"))
            .await
            .unwrap();
        assert_eq!(child.media.title.as_deref(), Some("The Matrix Reloaded"));

        let rebuilt = cache.get_search(&key).await.unwrap();
        assert_eq!(rebuilt.guids(), result.guids());
    }

    #[tokio::test]
    async fn test_search_with_evicted_child_is_miss() {
        let cache = MetadataCache::new(Duration::from_secs(3600), None);
        let key = CacheKey::search(Provider::Tmdb, MediaKind::Movie, &Locale::english(), "Matrix");

        let mut result = SearchResult::new("matrix");
        result.movies = vec![movie("603", "The Matrix")];
        cache.put_search(key.clone(), &result).await;
        cache
            .entries
            .remove(&CacheKey::Media(MediaGuid::movie(Provider::Tmdb, "603")))
            .await;

        assert!(cache.get_search(&key).await.is_none());
    }
}
