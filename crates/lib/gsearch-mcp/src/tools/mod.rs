//! MCP tool modules.
//!
//! Tools are grouped by domain: the search itself and contextual help.

pub mod context;
pub mod search;
