//! Upstream search backends.
//!
//! The fetcher only knows the `SearchBackend` trait; `GoogleBackend` is the
//! production implementation that scrapes Google's HTML result page.

pub mod google;

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use gsearch_store::SearchResult;

pub use google::{GoogleBackend, GoogleConfig, parse_results_page};

/// One upstream call as issued by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub query: String,
    pub num_results: u32,
    pub user_agent: String,
}

#[derive(Debug)]
pub enum FetchError {
    RateLimited { retry_after: Option<Duration> },
    Status(u16),
    Transport(String),
    InvalidResponse(String),
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Status(code) => *code == 408 || (*code >= 500 && *code <= 599),
            Self::InvalidResponse(_) | Self::RetriesExhausted { .. } => false,
        }
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { .. } => write!(f, "upstream rate limited the request (HTTP 429)"),
            Self::Status(code) => write!(f, "upstream returned HTTP {code}"),
            Self::Transport(message) => write!(f, "upstream request failed: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid upstream response: {message}"),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "search failed after {attempts} attempts: {last}")
            }
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RetriesExhausted { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

/// A source of ranked search results.
pub trait SearchBackend: Send + Sync + 'static {
    /// Runs one upstream search. Implementations must not retry on their own.
    fn search(
        &self,
        request: &UpstreamRequest,
    ) -> impl Future<Output = Result<Vec<SearchResult>, FetchError>> + Send;
}
