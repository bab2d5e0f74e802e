use crate::metadata::{
    Locale, MediaGuid, MediaKind, MetadataError, Provider, Result,
    types::{Movie, SearchResult, Show},
};
use async_trait::async_trait;

/// Core trait for metadata providers
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider namespace used in GUIDs
    fn id(&self) -> Provider;

    /// Human-readable provider name
    fn name(&self) -> &'static str;

    /// Media kinds this provider can search
    fn supported_kinds(&self) -> &[MediaKind];

    /// Whether lookups by GUID are available, or only search
    fn supports_lookup(&self) -> bool {
        true
    }

    /// Search by title. `None` searches every supported kind.
    ///
    /// Zero hits is reported as [`MetadataError::NotFound`].
    async fn search(
        &self,
        title: &str,
        kind: Option<MediaKind>,
        locale: &Locale,
    ) -> Result<SearchResult>;

    async fn get_movie(&self, guid: &MediaGuid, locale: &Locale) -> Result<Movie>;

    /// Show record; with `include_episodes` every season carries its episodes
    async fn get_show(
        &self,
        guid: &MediaGuid,
        locale: &Locale,
        include_episodes: bool,
    ) -> Result<Show>;
}

/// Reject GUIDs from another namespace, of the wrong kind, or below top level
pub(crate) fn check_guid(provider: Provider, guid: &MediaGuid, kind: MediaKind) -> Result<()> {
    if guid.provider() != provider {
        return Err(MetadataError::Validation(format!(
            "{guid} does not belong to {provider}"
        )));
    }
    if guid.kind() != kind || !guid.is_top_level() {
        return Err(MetadataError::Validation(format!(
            "{guid} is not a {kind} identifier"
        )));
    }
    Ok(())
}

/// Terminal upstream 404 on a lookup means the entity does not exist
pub(crate) fn lookup_error(err: MetadataError, guid: &MediaGuid) -> MetadataError {
    match err.status() {
        Some(404) => MetadataError::NotFound(guid.to_string()),
        _ => err,
    }
}

/// Numeric id of a top-level GUID
pub(crate) fn numeric_id(guid: &MediaGuid) -> Result<u64> {
    guid.id()
        .parse()
        .map_err(|_| MetadataError::Validation(format!("{guid} does not carry a numeric id")))
}

pub(crate) fn ensure_supported(
    provider: &(impl MetadataProvider + ?Sized),
    kind: Option<MediaKind>,
) -> Result<()> {
    match kind {
        Some(kind) if !provider.supported_kinds().contains(&kind) => {
            Err(MetadataError::Validation(format!(
                "{} does not support {kind} searches",
                provider.id()
            )))
        }
        _ => Ok(()),
    }
}

pub(crate) fn no_results(provider: Provider, title: &str) -> MetadataError {
    MetadataError::NotFound(format!("No {provider} results for: {title}"))
}
