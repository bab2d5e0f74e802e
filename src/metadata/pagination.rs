use crate::metadata::{Locale, Result};
use futures::{StreamExt, TryStreamExt, future::try_join_all, stream};
use std::future::Future;
use tracing::{debug, info};

/// One page of a paginated upstream listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Upstream page index (TMDB counts from 1, TVDB from 0)
    pub index: u32,
    /// Total number of pages reported by the first response
    pub total_pages: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub const fn new(index: u32, total_pages: u32, items: Vec<T>) -> Self {
        Self {
            index,
            total_pages,
            items,
        }
    }

    /// Page count from an item total, as TVDB reports it
    #[must_use]
    pub fn pages_for(total_items: u32, page_size: u32) -> u32 {
        if page_size == 0 {
            return 1;
        }
        total_items.div_ceil(page_size).max(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Indices of the pages following this one
    fn remaining(&self) -> std::ops::Range<u32> {
        let start = self.index.saturating_add(1);
        let end = self.index.saturating_add(self.total_pages.max(1));
        start..end
    }
}

/// Fetches pages 2..N of a listing concurrently and concatenates them in
/// page order, whatever order they complete in.
///
/// A failed page aborts the whole fetch; results of siblings still in
/// flight are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    max_in_flight: Option<usize>,
}

impl FanOut {
    /// Concurrency limited only by the connection pool
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_in_flight: None,
        }
    }

    /// At most `max_in_flight` pages requested at once
    #[must_use]
    pub const fn bounded(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: Some(max_in_flight),
        }
    }

    /// `0` means unbounded
    #[must_use]
    pub const fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            Self::unbounded()
        } else {
            Self::bounded(limit)
        }
    }

    pub async fn fetch_all<T, F, Fut>(&self, first: Page<T>, fetch: F) -> Result<Vec<T>>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let remaining = first.remaining();
        if remaining.is_empty() {
            return Ok(first.items);
        }

        debug!(
            first_page = first.index,
            total_pages = first.total_pages,
            max_in_flight = ?self.max_in_flight,
            "Fetching remaining pages"
        );

        let requests = remaining.map(&fetch);
        let pages: Vec<Page<T>> = match self.max_in_flight {
            None => try_join_all(requests).await?,
            Some(limit) => {
                stream::iter(requests)
                    .buffered(limit.max(1))
                    .try_collect()
                    .await?
            }
        };

        let mut items = first.items;
        for page in pages {
            items.extend(page.items);
        }
        Ok(items)
    }

    /// Fetch every page in `primary`, or in `fallback` when the first
    /// primary page is empty. At most one fallback is attempted and it
    /// replaces the whole fetch, not just the first page.
    pub async fn fetch_all_localized<T, F, Fut>(
        &self,
        first_index: u32,
        primary: &Locale,
        fallback: &Locale,
        fetch: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(Locale, u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut locale = primary.clone();
        let mut first = fetch(locale.clone(), first_index).await?;

        if first.is_empty() && !primary.same_language(fallback) {
            info!(primary = %primary, fallback = %fallback, "No results, retrying in fallback locale");
            locale = fallback.clone();
            first = fetch(locale.clone(), first_index).await?;
        }

        self.fetch_all(first, |index| fetch(locale.clone(), index))
            .await
    }
}

/// [`FanOut::fetch_all`] without a concurrency bound
pub async fn fetch_all<T, F, Fut>(first: Page<T>, fetch: F) -> Result<Vec<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    FanOut::unbounded().fetch_all(first, fetch).await
}

/// [`FanOut::fetch_all_localized`] without a concurrency bound
pub async fn fetch_all_localized<T, F, Fut>(
    first_index: u32,
    primary: &Locale,
    fallback: &Locale,
    fetch: F,
) -> Result<Vec<T>>
where
    F: Fn(Locale, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    FanOut::unbounded()
        .fetch_all_localized(first_index, primary, fallback, fetch)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Three pages of three items; later pages answer sooner
    async fn slow_page(index: u32) -> Result<Page<u32>> {
        tokio::time::sleep(Duration::from_millis(u64::from(10 - index) * 10)).await;
        let items = (0..3).map(|i| index * 10 + i).collect();
        Ok(Page::new(index, 3, items))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_merge_in_page_order() {
        let first = Page::new(1, 3, vec![10, 11, 12]);

        let items = fetch_all(first, slow_page).await.unwrap();

        assert_eq!(items, vec![10, 11, 12, 20, 21, 22, 30, 31, 32]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_pages_run_concurrently() {
        let first = Page::new(1, 3, vec![10, 11, 12]);
        let started = tokio::time::Instant::now();

        fetch_all(first, slow_page).await.unwrap();

        // Page 2 takes 80ms and page 3 70ms; run together they finish at 80ms.
        assert_eq!(started.elapsed(), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_fan_out_serializes() {
        let first = Page::new(1, 3, vec![10, 11, 12]);
        let started = tokio::time::Instant::now();

        let items = FanOut::bounded(1).fetch_all(first, slow_page).await.unwrap();

        assert_eq!(items.len(), 9);
        assert_eq!(started.elapsed(), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_based_listing() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requested);

        let first = Page::new(0, Page::<u32>::pages_for(250, 100), vec![0]);
        let items = fetch_all(first, |index| {
            log.lock().unwrap().push(index);
            std::future::ready(Ok(Page::new(index, 3, vec![index])))
        })
        .await
        .unwrap();

        assert_eq!(items, vec![0, 1, 2]);
        assert_eq!(*requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_single_page_issues_no_requests() {
        let first = Page::new(1, 1, vec!["only"]);

        let items = fetch_all(first, |_| async {
            Err::<Page<&str>, _>(MetadataError::Transport("unexpected".to_string()))
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["only"]);
    }

    #[tokio::test]
    async fn test_failed_page_fails_whole_fetch() {
        let first = Page::new(1, 4, vec![1]);

        let result = fetch_all(first, |index| async move {
            if index == 3 {
                Err(MetadataError::UpstreamStatus {
                    status: 500,
                    message: None,
                })
            } else {
                Ok(Page::new(index, 4, vec![index]))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
    }

    #[tokio::test]
    async fn test_locale_fallback_runs_once() {
        let primary: Locale = "it-IT".parse().unwrap();
        let fallback = Locale::english();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);

        let items = fetch_all_localized(1, &primary, &fallback, |locale, index| {
            log.lock().unwrap().push((locale.to_string(), index));
            let items = if locale.language() == "en" {
                vec![format!("{locale}/{index}")]
            } else {
                Vec::new()
            };
            std::future::ready(Ok(Page::new(index, 2, items)))
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["en-US/1", "en-US/2"]);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                ("it-IT".to_string(), 1),
                ("en-US".to_string(), 1),
                ("en-US".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_locale_fallback_empty_in_both() {
        let primary: Locale = "it-IT".parse().unwrap();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let items = fetch_all_localized(1, &primary, &Locale::english(), |_, index| {
            *counter.lock().unwrap() += 1;
            std::future::ready(Ok(Page::<u32>::new(index, 1, Vec::new())))
        })
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_no_fallback_for_same_language() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let primary: Locale = "en-GB".parse().unwrap();
        fetch_all_localized(1, &primary, &Locale::english(), |_, index| {
            *counter.lock().unwrap() += 1;
            std::future::ready(Ok(Page::<u32>::new(index, 1, Vec::new())))
        })
        .await
        .unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
