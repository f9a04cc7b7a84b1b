//! MCP server runners for gsearch-mcp.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router};
use axum::routing::get;
use gsearch_core::backend::SearchBackend;
use gsearch_core::control::SearchControl;
use rmcp::serve_server;
use serde_json::json;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::{GoogleSearchMcp, SearchDefaults};

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:4030".parse().expect("valid MCP HTTP address"))
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<B: SearchBackend>(
    control: SearchControl<B>,
    defaults: SearchDefaults,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = GoogleSearchMcp::with_defaults(control, defaults);
    let (stdin, stdout) = stdio();
    info!("serving MCP over stdio");
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Builds the HTTP application: the MCP service under `/mcp` and `GET /health`.
#[must_use]
pub fn http_router<B: SearchBackend>(
    control: SearchControl<B>,
    defaults: SearchDefaults,
    config: &McpHttpServerConfig,
) -> Router {
    let service: StreamableHttpService<GoogleSearchMcp<B>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(GoogleSearchMcp::with_defaults(control.clone(), defaults)),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest_service("/mcp", service)
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<B: SearchBackend>(
    control: SearchControl<B>,
    defaults: SearchDefaults,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = http_router(control, defaults, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "serving MCP over streamable HTTP at /mcp");
    axum::serve(listener, app).await?;
    Ok(())
}
