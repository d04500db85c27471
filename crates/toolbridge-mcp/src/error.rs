//! Error types for the MCP crate.

use crate::access::AccessDenied;
use crate::protocol::{ErrorCode, JsonRpcError};
use crate::security::AuthValidationError;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that can occur while starting or serving the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Tool registry could not be sealed.
    #[error(transparent)]
    Registry(#[from] crate::tools::RegistryError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors produced while executing a single tool call.
///
/// Each variant maps onto one JSON-RPC error object via [`ToolError::to_rpc_error`].
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed schema validation.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments {
        tool: String,
        reason: String,
        field: Option<String>,
    },

    /// Required credentials were missing or unusable.
    #[error(transparent)]
    Authentication(#[from] AuthValidationError),

    /// Caller lacks the permission guarding the tool.
    #[error("access to tool {tool} denied: {denial}")]
    AccessDenied { tool: String, denial: AccessDenied },

    /// Host handler answered with a non-success status.
    #[error("host returned HTTP {status}")]
    UpstreamStatus { status: u16, body: Value },

    /// Sub-request could not be built or dispatched.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A direct tool handler failed.
    #[error("tool handler failed: {0}")]
    Handler(String),
}

impl ToolError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
            field: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::InvalidArguments { .. }
            | ToolError::Authentication(_)
            | ToolError::AccessDenied { .. } => ErrorCode::InvalidParams,
            ToolError::UpstreamStatus { status, .. } => match status {
                404 | 405 => ErrorCode::MethodNotFound,
                400..=499 => ErrorCode::InvalidParams,
                _ => ErrorCode::InternalError,
            },
            ToolError::Dispatch(_) | ToolError::Handler(_) => ErrorCode::InternalError,
        }
    }

    /// Structured `data` member of the JSON-RPC error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            ToolError::InvalidArguments { field, .. } => {
                field.as_ref().map(|field| json!({ "field": field }))
            }
            ToolError::Authentication(err) => Some(json!({
                "authentication_error_type": err.kind.as_str(),
                "scheme": err.scheme,
                "missing": err.missing,
            })),
            ToolError::AccessDenied { tool, denial } => {
                let mut data = json!({
                    "authorization_error_type": denial.kind(),
                    "tool": tool,
                });
                if let Some(permission) = denial.permission() {
                    data["permission"] = json!(permission);
                }
                Some(data)
            }
            ToolError::UpstreamStatus { status, body } => {
                Some(json!({ "status": status, "body": body }))
            }
            ToolError::Dispatch(_) | ToolError::Handler(_) => None,
        }
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        let error = JsonRpcError::new(self.code(), self.to_string());
        match self.data() {
            Some(data) => error.with_data(data),
            None => error,
        }
    }
}
