use std::error::Error;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{MAX_NUM_RESULTS, MIN_NUM_RESULTS, make_cache_key, num_results_in_range};

/// A single ranked result returned by the upstream search page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SearchResult {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyQuery,
    NumResultsOutOfRange { value: i64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "query must not be empty"),
            Self::NumResultsOutOfRange { value } => write!(
                f,
                "num_results must be between {MIN_NUM_RESULTS} and {MAX_NUM_RESULTS} (got {value})"
            ),
        }
    }
}

impl Error for ValidationError {}

/// A validated search request. Construction is the only place parameters are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    query: String,
    num_results: u32,
    use_cache: bool,
    include_descriptions: bool,
}

impl SearchRequest {
    /// Validates and builds a request.
    ///
    /// The query is trimmed; `num_results` is accepted as a signed value so
    /// negative inputs from loosely typed clients are reported, not wrapped.
    ///
    /// # Errors
    /// Returns `ValidationError` if the query is blank or `num_results` is
    /// outside the supported range.
    pub fn new(
        query: &str,
        num_results: i64,
        use_cache: bool,
        include_descriptions: bool,
    ) -> Result<Self, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        let num_results = u32::try_from(num_results)
            .ok()
            .filter(|value| num_results_in_range(*value))
            .ok_or(ValidationError::NumResultsOutOfRange { value: num_results })?;
        Ok(Self {
            query: query.to_string(),
            num_results,
            use_cache,
            include_descriptions,
        })
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub const fn num_results(&self) -> u32 {
        self.num_results
    }

    #[must_use]
    pub const fn use_cache(&self) -> bool {
        self.use_cache
    }

    #[must_use]
    pub const fn include_descriptions(&self) -> bool {
        self.include_descriptions
    }

    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.query, self.num_results, self.include_descriptions)
    }
}

/// Address of a cached result list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn derive(query: &str, num_results: u32, include_descriptions: bool) -> Self {
        Self(make_cache_key(query, num_results, include_descriptions))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached results for one key, stamped with the time they were fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub query: String,
    pub num_results: u32,
    pub include_descriptions: bool,
    pub results: Vec<SearchResult>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(request: &SearchRequest, results: Vec<SearchResult>) -> Self {
        Self {
            key: request.cache_key(),
            query: request.query().to_string(),
            num_results: request.num_results(),
            include_descriptions: request.include_descriptions(),
            results,
            cached_at: Utc::now(),
        }
    }

    /// Returns true while the entry is younger than `ttl`. A `None` ttl never expires.
    #[must_use]
    pub fn is_fresh(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = ttl else {
            return true;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now.signed_duration_since(self.cached_at) < ttl
    }
}

/// Structured payload handed back to MCP clients next to the markdown rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub cached: bool,
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    #[must_use]
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>, cached: bool) -> Self {
        Self {
            query: query.into(),
            total_results: results.len(),
            cached,
            results,
        }
    }
}
