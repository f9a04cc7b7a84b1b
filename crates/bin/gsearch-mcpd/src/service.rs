use gsearch_core::agents::UserAgentPool;
use gsearch_core::backend::{FetchError, GoogleBackend, GoogleConfig};
use gsearch_core::cache::{CacheConfig, ResultCache};
use gsearch_core::control::SearchControl;
use gsearch_core::fetch::{FetchConfig, ThrottledFetcher};
use gsearch_mcp::SearchDefaults;
use tracing::{info, warn};

use crate::config::GsearchConfig;

pub fn build_control(config: &GsearchConfig) -> Result<SearchControl<GoogleBackend>, FetchError> {
    let backend = GoogleBackend::new(
        GoogleConfig::default()
            .with_language(config.language.clone())
            .with_region(config.region.clone())
            .with_safe(config.safe.clone())
            .with_timeout(config.http_timeout),
    )?;

    let mut fetch_config = FetchConfig::new(config.request_delay, config.max_retries)
        .with_request_jitter(config.request_jitter)
        .with_max_backoff(config.max_backoff);
    if !config.user_agents.is_empty() {
        fetch_config = fetch_config.with_user_agents(UserAgentPool::new(config.user_agents.clone()));
    }
    let control = SearchControl::new(ThrottledFetcher::new(backend, fetch_config));

    let Some(cache) = build_cache(config) else {
        return Ok(control);
    };
    Ok(control.with_cache(cache))
}

/// Opens the result cache. A cache that cannot be opened disables caching
/// rather than failing startup.
fn build_cache(config: &GsearchConfig) -> Option<ResultCache> {
    let path = config.cache_path.clone()?;
    let mut cache_config = CacheConfig::new(path);
    if let Some(ttl) = config.cache_ttl {
        cache_config = cache_config.with_ttl(ttl);
    }
    if let Some(max_entries) = config.cache_max_entries {
        cache_config = cache_config.with_max_entries(max_entries);
    }

    match ResultCache::open(cache_config) {
        Ok(cache) => {
            info!(path = %cache.path().display(), "using result cache");
            Some(cache)
        }
        Err(err) => {
            warn!(error = %err, "cannot open result cache; continuing without it");
            None
        }
    }
}

pub const fn search_defaults(config: &GsearchConfig) -> SearchDefaults {
    SearchDefaults {
        num_results: config.num_results,
        use_cache: config.use_cache,
        include_descriptions: config.include_descriptions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(cache_path: Option<PathBuf>) -> GsearchConfig {
        GsearchConfig {
            log_level: "info".to_string(),
            log_file: None,
            cache_path,
            cache_ttl: Some(Duration::from_secs(60)),
            cache_max_entries: Some(10),
            request_delay: Duration::from_secs(5),
            request_jitter: Duration::ZERO,
            max_retries: 4,
            max_backoff: Duration::from_secs(30),
            num_results: 7,
            use_cache: false,
            include_descriptions: true,
            http_timeout: Duration::from_secs(3),
            language: "de".to_string(),
            region: None,
            safe: None,
            user_agents: vec!["Lynx/2.9.0".to_string()],
            serve_http: false,
            mcp_http_addr: "127.0.0.1:4030".parse().expect("addr"),
        }
    }

    #[test]
    fn wires_cache_and_fetch_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control =
            build_control(&config(Some(dir.path().join("nested/cache.json")))).expect("control");

        let cache = control.cache().expect("cache");
        assert_eq!(cache.config().ttl, Some(Duration::from_secs(60)));
        assert_eq!(cache.config().max_entries, Some(10));
        assert_eq!(control.fetcher().policy().max_attempts, 4);
        assert_eq!(control.fetcher().backend().config().language, "de");
    }

    #[test]
    fn unusable_cache_path_disables_caching() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").expect("write blocker");

        let control = build_control(&config(Some(blocker.join("cache.json")))).expect("control");
        assert!(control.cache().is_none());
    }

    #[test]
    fn defaults_follow_configuration() {
        let defaults = search_defaults(&config(None));
        assert_eq!(defaults.num_results, 7);
        assert!(!defaults.use_cache);
        assert!(defaults.include_descriptions);
    }
}
