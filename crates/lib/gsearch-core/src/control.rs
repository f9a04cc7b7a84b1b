//! Request handling: cache lookup, throttled fetch, cache write.

use std::error::Error;
use std::fmt;

use gsearch_store::{CacheEntry, SearchRequest, SearchResponse, SearchResult};
use tracing::{debug, info, warn};

use crate::backend::{FetchError, SearchBackend};
use crate::cache::ResultCache;
use crate::fetch::ThrottledFetcher;
use crate::render::render_markdown;

#[derive(Debug)]
pub enum ControlError {
    Fetch(FetchError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
        }
    }
}

impl From<FetchError> for ControlError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

/// Formatted outcome of a search: structured payload plus its markdown rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub response: SearchResponse,
    pub markdown: String,
}

/// Composes the result cache and the throttled fetcher.
pub struct SearchControl<B: SearchBackend> {
    cache: Option<ResultCache>,
    fetcher: ThrottledFetcher<B>,
}

impl<B: SearchBackend> Clone for SearchControl<B> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<B: SearchBackend> SearchControl<B> {
    #[must_use]
    pub const fn new(fetcher: ThrottledFetcher<B>) -> Self {
        Self {
            cache: None,
            fetcher,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    #[must_use]
    pub const fn fetcher(&self) -> &ThrottledFetcher<B> {
        &self.fetcher
    }

    /// Serves a validated request.
    ///
    /// With `use_cache`, a fresh cached entry for the exact key is returned
    /// without touching the upstream. Otherwise results are fetched and
    /// written back to the cache, whether or not the request asked to read it.
    ///
    /// # Errors
    /// Returns `ControlError::Fetch` when the upstream fetch fails terminally.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ControlError> {
        info!(
            query = request.query(),
            num_results = request.num_results(),
            use_cache = request.use_cache(),
            include_descriptions = request.include_descriptions(),
            "search request"
        );

        if request.use_cache() {
            if let Some(results) = self.cached_results(request).await {
                info!(query = request.query(), count = results.len(), "using cached results");
                return Ok(SearchResponse::new(request.query(), results, true));
            }
        }

        let mut results = self
            .fetcher
            .fetch(
                request.query(),
                request.num_results(),
                request.include_descriptions(),
            )
            .await?;
        self.store_results(request, &results).await;

        results.truncate(usize::try_from(request.num_results()).unwrap_or(usize::MAX));
        Ok(SearchResponse::new(request.query(), results, false))
    }

    /// Like [`Self::search`], with the markdown rendering attached.
    ///
    /// # Errors
    /// Returns `ControlError::Fetch` when the upstream fetch fails terminally.
    pub async fn search_formatted(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, ControlError> {
        let response = self.search(request).await?;
        let markdown = render_markdown(&response);
        Ok(SearchOutcome { response, markdown })
    }

    async fn cached_results(&self, request: &SearchRequest) -> Option<Vec<SearchResult>> {
        let cache = self.cache.clone()?;
        let key = request.cache_key();
        match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(mut results) => {
                if let Some(results) = results.as_mut() {
                    results.truncate(usize::try_from(request.num_results()).unwrap_or(usize::MAX));
                }
                results
            }
            Err(err) => {
                warn!(error = %err, "cache lookup task failed; treating as miss");
                None
            }
        }
    }

    async fn store_results(&self, request: &SearchRequest, results: &[SearchResult]) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let entry = CacheEntry::new(request, results.to_vec());
        match tokio::task::spawn_blocking(move || cache.put(entry)).await {
            Ok(Ok(())) => debug!(query = request.query(), "updated cache"),
            Ok(Err(err)) => warn!(query = request.query(), error = %err, "failed to update cache"),
            Err(err) => warn!(error = %err, "cache write task failed"),
        }
    }
}
