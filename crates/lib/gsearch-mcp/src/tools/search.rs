use gsearch_core::backend::SearchBackend;
use gsearch_store::SearchRequest;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{GoogleSearchMcp, helpers};

/// Arguments accepted by the `google_search` tool.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GoogleSearchParams {
    /// The search query.
    pub query: String,
    /// Number of results to return, between 1 and 20. Defaults to 5.
    #[schemars(range(min = 1, max = 20))]
    pub num_results: Option<i64>,
    /// Serve an identical previous search from the local cache. Defaults to true.
    pub use_cache: Option<bool>,
    /// Include the snippet under each result. Defaults to true.
    pub include_descriptions: Option<bool>,
}

impl<B: SearchBackend> GoogleSearchMcp<B> {
    /// Applies the configured defaults and validates the request.
    pub(crate) fn resolve_request(
        &self,
        query: &str,
        num_results: Option<i64>,
        use_cache: Option<bool>,
        include_descriptions: Option<bool>,
    ) -> Result<SearchRequest, ErrorData> {
        let defaults = self.defaults();
        SearchRequest::new(
            query,
            num_results.unwrap_or_else(|| i64::from(defaults.num_results)),
            use_cache.unwrap_or(defaults.use_cache),
            include_descriptions.unwrap_or(defaults.include_descriptions),
        )
        .map_err(|err| helpers::map_validation_err(&err))
    }
}

#[tool_router(router = tool_router_search, vis = "pub")]
impl<B: SearchBackend> GoogleSearchMcp<B> {
    #[tool(
        name = "google_search",
        description = "Search Google and return the results as numbered markdown links, with snippets unless include_descriptions is false.",
        annotations(
            title = "Google Search",
            read_only_hint = true,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn google_search(
        &self,
        Parameters(params): Parameters<GoogleSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = self.resolve_request(
            &params.query,
            params.num_results,
            params.use_cache,
            params.include_descriptions,
        )?;

        match self.control().search_formatted(&request).await {
            Ok(outcome) => Ok(CallToolResult::success(vec![
                Content::text(outcome.markdown),
                Content::json(outcome.response)?,
            ])),
            Err(err) => {
                warn!(query = request.query(), error = %err, "google_search failed");
                Ok(helpers::search_failed(&err))
            }
        }
    }
}
