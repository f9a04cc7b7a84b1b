//! Throttled, retried access to the upstream backend.

use std::sync::Arc;
use std::time::Duration;

use gsearch_store::SearchResult;
use tracing::{error, info, warn};

use crate::agents::UserAgentPool;
use crate::backend::{FetchError, SearchBackend, UpstreamRequest};
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;

/// Configuration for pacing and retrying upstream calls.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub request_delay: Duration,
    pub request_jitter: Duration,
    pub max_retries: u32,
    pub max_backoff: Duration,
    pub backoff_jitter: Duration,
    pub user_agents: UserAgentPool,
}

impl FetchConfig {
    #[must_use]
    pub fn new(request_delay: Duration, max_retries: u32) -> Self {
        Self {
            request_delay,
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_request_jitter(mut self, request_jitter: Duration) -> Self {
        self.request_jitter = request_jitter;
        self
    }

    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    #[must_use]
    pub const fn with_backoff_jitter(mut self, backoff_jitter: Duration) -> Self {
        self.backoff_jitter = backoff_jitter;
        self
    }

    #[must_use]
    pub fn with_user_agents(mut self, user_agents: UserAgentPool) -> Self {
        self.user_agents = user_agents;
        self
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.request_delay)
            .with_max_backoff(self.max_backoff)
            .with_jitter(self.backoff_jitter)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(5),
            request_jitter: Duration::from_secs(2),
            max_retries: 3,
            max_backoff: Duration::from_secs(60),
            backoff_jitter: Duration::from_secs(2),
            user_agents: UserAgentPool::default(),
        }
    }
}

/// Calls the backend at most once per throttle slot and retries transient failures.
pub struct ThrottledFetcher<B: SearchBackend> {
    backend: Arc<B>,
    throttle: Arc<Throttle>,
    policy: RetryPolicy,
    user_agents: UserAgentPool,
}

impl<B: SearchBackend> Clone for ThrottledFetcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            throttle: self.throttle.clone(),
            policy: self.policy,
            user_agents: self.user_agents.clone(),
        }
    }
}

impl<B: SearchBackend> ThrottledFetcher<B> {
    #[must_use]
    pub fn new(backend: B, config: FetchConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    #[must_use]
    pub fn with_backend(backend: Arc<B>, config: FetchConfig) -> Self {
        Self {
            backend,
            throttle: Arc::new(Throttle::new(config.request_delay, config.request_jitter)),
            policy: config.retry_policy(),
            user_agents: config.user_agents,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches up to `num_results` results, in upstream order.
    ///
    /// Each attempt waits for a throttle slot and uses a freshly rotated user
    /// agent. Transient failures back off exponentially until the policy's
    /// attempt budget is spent.
    ///
    /// # Errors
    /// Returns the first non-transient `FetchError`, or
    /// `FetchError::RetriesExhausted` once every attempt failed transiently.
    pub async fn fetch(
        &self,
        query: &str,
        num_results: u32,
        include_descriptions: bool,
    ) -> Result<Vec<SearchResult>, FetchError> {
        let mut user_agent: Option<String> = None;
        let mut attempt = 0;

        loop {
            let agent = self.user_agents.pick_after(user_agent.as_deref());
            let request = UpstreamRequest {
                query: query.to_string(),
                num_results,
                user_agent: agent.clone(),
            };
            user_agent = Some(agent);

            self.throttle.wait().await;
            info!(
                query,
                attempt = attempt + 1,
                user_agent = %truncate_agent(&request.user_agent),
                "searching upstream"
            );

            let err = match self.backend.search(&request).await {
                Ok(mut results) => {
                    results.truncate(usize::try_from(num_results).unwrap_or(usize::MAX));
                    if !include_descriptions {
                        for result in &mut results {
                            result.description = None;
                        }
                    }
                    info!(query, count = results.len(), "retrieved upstream results");
                    return Ok(results);
                }
                Err(err) => err,
            };

            attempt += 1;
            if !err.is_transient() {
                error!(query, attempt, error = %err, "upstream search failed");
                return Err(err);
            }
            if !self.policy.allows_another(attempt) {
                error!(query, attempts = attempt, error = %err, "exhausted retries");
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let mut wait = self.policy.backoff(attempt - 1);
            if let Some(retry_after) = err.retry_after() {
                wait = wait.max(retry_after.min(self.policy.max_backoff));
            }
            warn!(
                query,
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient upstream failure; backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

fn truncate_agent(agent: &str) -> &str {
    agent
        .char_indices()
        .nth(30)
        .map_or(agent, |(index, _)| &agent[..index])
}
