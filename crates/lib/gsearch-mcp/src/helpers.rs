use std::borrow::Cow;

use gsearch_core::control::ControlError;
use gsearch_store::ValidationError;
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

pub fn invalid_params(message: impl Into<Cow<'static, str>>) -> ErrorData {
    mcp_err(ErrorCode::INVALID_PARAMS, message)
}

pub fn map_validation_err(err: &ValidationError) -> ErrorData {
    invalid_params(err.to_string())
}

/// Search failures are reported to the model as a tool error, not a protocol error.
pub fn search_failed(err: &ControlError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("Search failed: {err}"))])
}
