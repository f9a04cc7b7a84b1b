//! Search result models and cache key helpers for gsearch-mcp.
//!
//! This crate defines the data shared by the fetcher, the result cache, and
//! the MCP layer: validated requests, ranked results, and cache entries.

pub mod models;
pub mod schema;

pub use models::*;
