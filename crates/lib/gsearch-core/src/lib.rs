//! Core services for gsearch-mcp.
//!
//! This crate owns the file-backed result cache, the throttled and retried
//! upstream fetcher, and the request handler that composes the two.

pub mod agents;
pub mod backend;
pub mod cache;
pub mod control;
pub mod fetch;
pub mod render;
pub mod retry;
pub mod throttle;
