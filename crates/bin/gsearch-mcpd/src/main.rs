//! Daemon entry point for the Google search MCP server.
//!
//! Loads configuration from `.env`, the environment and the command line,
//! builds the search control, and serves MCP over stdio or streamable HTTP.

mod config;
mod logging;
mod service;

use gsearch_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::info;

use crate::config::GsearchConfig;
use crate::service::{build_control, search_defaults};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();
    let config = GsearchConfig::from_args()?;
    logging::init(&config)?;

    let control = build_control(&config)?;
    let defaults = search_defaults(&config);
    info!(
        request_delay_secs = config.request_delay.as_secs(),
        max_retries = config.max_retries,
        cache = control.cache().is_some(),
        "gsearch-mcpd starting"
    );

    if config.serve_http {
        serve_streamable_http(control, defaults, McpHttpServerConfig::new(config.mcp_http_addr))
            .await
    } else {
        serve_stdio(control, defaults).await
    }
}
