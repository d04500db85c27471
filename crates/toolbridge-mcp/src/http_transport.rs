//! HTTP transport for MCP server.
//!
//! JSON-RPC messages are POSTed to the configured mount path. The inbound
//! request's headers and extensions become the [`CallContext`] of every
//! tool call it carries, so host middleware layered in front of the MCP
//! endpoint (sessions, transactions) reaches the dispatched sub-requests.

use crate::bridge::CallContext;
use crate::error::McpError;
use crate::protocol::{ErrorCode, JsonRpcResponse};
use crate::server::McpServer;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;

/// Largest JSON-RPC request body accepted, matching axum's default body limit.
pub const MAX_REQUEST_BYTES: usize = 2 * 1024 * 1024;

/// Create the HTTP router for MCP.
pub fn create_router(server: Arc<McpServer>) -> Router {
    let mount_path = server.config().mount_path.clone();
    Router::new()
        .route(&mount_path, post(handle_mcp_post))
        .route("/health", get(handle_health))
        .with_state(server)
}

/// Merge the MCP endpoint into a host router.
pub fn mount(host: Router, server: Arc<McpServer>) -> Router {
    let mount_path = server.config().mount_path.clone();
    host.route(&mount_path, post(handle_mcp_post).with_state(server))
}

/// Handle POST requests to the mount path (JSON-RPC over HTTP).
async fn handle_mcp_post(State(server): State<Arc<McpServer>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let context = CallContext::from_parts(&parts);

    let bytes: Bytes = match axum::body::to_bytes(body, MAX_REQUEST_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("failed to read request body: {e}"),
            )
                .into_response();
        }
    };
    let raw = match std::str::from_utf8(&bytes) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting non-UTF-8 message");
            let response =
                JsonRpcResponse::error(None, ErrorCode::ParseError, format!("Parse error: {e}"));
            return (StatusCode::OK, Json(response)).into_response();
        }
    };

    match server.handle_message(raw, &context).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Handle health check requests.
async fn handle_health(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": server.config().server_name,
        "version": server.config().version(),
        "tools": server.registry().len(),
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    server: Arc<McpServer>,
    router: Option<Router>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            router: None,
        }
    }

    /// Serve the MCP endpoint alongside a host router.
    pub fn with_host(mut self, host: Router) -> Self {
        self.router = Some(host);
        self
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), McpError> {
        let addr = self.server.config().bind_addr();
        let app = match self.router {
            Some(host) => mount(host, self.server.clone())
                .route("/health", get(handle_health).with_state(self.server.clone())),
            None => create_router(self.server.clone()),
        };

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!(
            %addr,
            mount_path = %self.server.config().mount_path,
            tools = self.server.registry().len(),
            "MCP HTTP server listening"
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(())
    }
}
