//! MCP prompts.
//!
//! Prompt arguments arrive as strings, so numeric and boolean values are
//! parsed here before the request is validated.

use gsearch_core::backend::SearchBackend;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{PromptMessage, PromptMessageRole},
    prompt,
    prompt_router,
    schemars,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{GoogleSearchMcp, helpers};

/// Arguments accepted by the `google_search` prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GoogleSearchPromptArgs {
    /// The search query.
    pub query: String,
    /// Number of results to return, between 1 and 20.
    pub num_results: Option<String>,
    /// "true" to serve an identical previous search from the local cache.
    pub use_cache: Option<String>,
    /// "true" to include the snippet under each result.
    pub include_descriptions: Option<String>,
}

#[prompt_router(router = "prompt_router_search", vis = "pub")]
impl<B: SearchBackend> GoogleSearchMcp<B> {
    #[prompt(
        name = "google_search",
        description = "Search Google and ask for a summary of what the results say."
    )]
    async fn google_search_prompt(
        &self,
        Parameters(args): Parameters<GoogleSearchPromptArgs>,
    ) -> Result<Vec<PromptMessage>, ErrorData> {
        let num_results = args
            .num_results
            .as_deref()
            .map(|value| parse_count("num_results", value))
            .transpose()?;
        let use_cache = args
            .use_cache
            .as_deref()
            .map(|value| parse_flag("use_cache", value))
            .transpose()?;
        let include_descriptions = args
            .include_descriptions
            .as_deref()
            .map(|value| parse_flag("include_descriptions", value))
            .transpose()?;
        let request =
            self.resolve_request(&args.query, num_results, use_cache, include_descriptions)?;

        let results = match self.control().search_formatted(&request).await {
            Ok(outcome) => outcome.markdown,
            Err(err) => {
                warn!(query = request.query(), error = %err, "google_search prompt failed");
                format!("Search failed: {err}")
            }
        };

        Ok(vec![
            PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Search Google for \"{}\" and summarize the most relevant findings. \
                     Cite the links you rely on.",
                    request.query()
                ),
            ),
            PromptMessage::new_text(PromptMessageRole::Assistant, results),
        ])
    }
}

fn parse_count(name: &'static str, value: &str) -> Result<i64, ErrorData> {
    value
        .trim()
        .parse()
        .map_err(|_| helpers::invalid_params(format!("{name} must be an integer, got {value:?}")))
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ErrorData> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(helpers::invalid_params(format!(
            "{name} must be true or false, got {value:?}"
        ))),
    }
}
