//! MCP server implementation for gsearch-mcp.
//!
//! This crate wires the search control into rmcp tool and prompt handlers and
//! exposes the MCP-facing API surface.

mod helpers;
mod prompts;
mod tools;
pub mod server;

pub use prompts::GoogleSearchPromptArgs;
pub use tools::context::HelpCommands;
pub use tools::search::GoogleSearchParams;

use gsearch_core::backend::SearchBackend;
use gsearch_core::control::SearchControl;
use gsearch_store::schema::DEFAULT_NUM_RESULTS;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::router::prompt::PromptRouter,
    handler::server::tool::ToolRouter,
    prompt_handler,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{
    CallToolResult, Content, GetPromptRequestParams, GetPromptResult, ListPromptsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::RoleServer;

const SERVER_INSTRUCTIONS: &str = r"gsearch-mcp runs Google web searches on behalf of the model.

Workflow:
1. Call `google_search` with a `query`. Optional arguments:
   - `num_results` (1-20) limits how many results come back.
   - `use_cache` (default true) serves a previous identical search from the local cache.
   - `include_descriptions` (default true) keeps the result snippets.
2. The tool returns a markdown list of numbered links plus a JSON block with the same results.
3. The `google_search` prompt runs the same search and frames it as a request to summarize.

Notes:
- Outbound searches are throttled and retried with backoff, so an uncached search can take several seconds.
- A failed search is reported as a tool error rather than an empty list.
- `help` lists the commands. `health` returns `ok`.";

/// Defaults applied to tool and prompt arguments the caller leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchDefaults {
    pub num_results: u32,
    pub use_cache: bool,
    pub include_descriptions: bool,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            num_results: DEFAULT_NUM_RESULTS,
            use_cache: true,
            include_descriptions: true,
        }
    }
}

/// MCP server wrapper around the search control and its routers.
pub struct GoogleSearchMcp<B: SearchBackend> {
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
    control: SearchControl<B>,
    defaults: SearchDefaults,
}

impl<B: SearchBackend> Clone for GoogleSearchMcp<B> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            prompt_router: self.prompt_router.clone(),
            control: self.control.clone(),
            defaults: self.defaults,
        }
    }
}

impl<B: SearchBackend> GoogleSearchMcp<B> {
    /// Creates a new server with the default argument values.
    #[must_use]
    pub fn new(control: SearchControl<B>) -> Self {
        Self::with_defaults(control, SearchDefaults::default())
    }

    /// Creates a new server with caller-provided argument defaults.
    #[must_use]
    pub fn with_defaults(control: SearchControl<B>, defaults: SearchDefaults) -> Self {
        let tool_router =
            Self::tool_router_core() + Self::tool_router_search() + Self::tool_router_context();
        Self {
            tool_router,
            prompt_router: Self::prompt_router_search(),
            control,
            defaults,
        }
    }

    #[must_use]
    pub const fn control(&self) -> &SearchControl<B> {
        &self.control
    }

    #[must_use]
    pub const fn defaults(&self) -> SearchDefaults {
        self.defaults
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<B: SearchBackend> GoogleSearchMcp<B> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
#[prompt_handler]
impl<B: SearchBackend> ServerHandler for GoogleSearchMcp<B> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use gsearch_core::backend::{FetchError, SearchBackend, UpstreamRequest};
    use gsearch_core::cache::{CacheConfig, ResultCache};
    use gsearch_core::control::SearchControl;
    use gsearch_core::fetch::{FetchConfig, ThrottledFetcher};
    use gsearch_store::SearchResult;

    use crate::GoogleSearchMcp;

    /// Replays scripted outcomes, then falls back to synthetic results.
    pub struct ScriptedBackend {
        calls: AtomicUsize,
        outcomes: Mutex<VecDeque<Result<Vec<SearchResult>, FetchError>>>,
    }

    impl ScriptedBackend {
        pub fn new(outcomes: Vec<Result<Vec<SearchResult>, FetchError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcomes: Mutex::new(outcomes.into()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SearchBackend for ScriptedBackend {
        async fn search(
            &self,
            request: &UpstreamRequest,
        ) -> Result<Vec<SearchResult>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().expect("outcomes lock").pop_front();
            next.unwrap_or_else(|| {
                Ok((1..=request.num_results)
                    .map(|rank| {
                        SearchResult::new(
                            format!("{} {rank}", request.query),
                            format!("https://example.test/{rank}"),
                        )
                        .with_description(format!("snippet {rank}"))
                    })
                    .collect())
            })
        }
    }

    pub fn server(
        dir: &tempfile::TempDir,
        outcomes: Vec<Result<Vec<SearchResult>, FetchError>>,
    ) -> GoogleSearchMcp<ScriptedBackend> {
        let cache = ResultCache::open(CacheConfig::new(dir.path().join("google_cache.json")))
            .expect("open cache");
        let config = FetchConfig::new(Duration::ZERO, 2)
            .with_request_jitter(Duration::ZERO)
            .with_backoff_jitter(Duration::ZERO);
        let fetcher = ThrottledFetcher::new(ScriptedBackend::new(outcomes), config);
        GoogleSearchMcp::new(SearchControl::new(fetcher).with_cache(cache))
    }
}
