//! MCP server implementation.
//!
//! The server owns the sealed tool registry and the request bridge, and
//! answers JSON-RPC messages from either transport.

use crate::access::AccessGate;
use crate::bridge::{CallContext, HostDispatch, RequestBridge};
use crate::discovery::RouteDiscoverer;
use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::security::SecurityTranslator;
use crate::tools::{ManualTool, RegistryBuilder, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use toolbridge_core::{BridgeConfig, CommittedRoutes, McpConfig, Transport};

/// Assembles an [`McpServer`] from configuration, manual tools and the
/// host's committed routes.
pub struct ServerBuilder {
    config: BridgeConfig,
    tools: RegistryBuilder,
    gate: Option<AccessGate>,
}

impl ServerBuilder {
    /// Stage a manual tool.
    pub fn tool(mut self, tool: ManualTool) -> Self {
        self.tools.register(tool);
        self
    }

    /// Access gate for manual tools; pass the one layered on the host.
    pub fn gate(mut self, gate: AccessGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Discover routes, seal the registry and wire up the bridge.
    pub fn build(
        self,
        routes: &CommittedRoutes,
        host: impl HostDispatch + 'static,
    ) -> Result<McpServer, McpError> {
        let translator = SecurityTranslator::new(self.config.discovery.expose_auth_as_params);
        let report = RouteDiscoverer::new(&self.config.discovery).discover(routes);
        let registry = self.tools.seal(report.tools)?;

        let mut bridge =
            RequestBridge::new(host, translator).with_mount_path(&self.config.mcp.mount_path);
        if let Some(gate) = self.gate {
            bridge = bridge.with_gate(gate);
        }

        Ok(McpServer::new(self.config.mcp, registry, bridge))
    }
}

/// The MCP server.
#[derive(Debug)]
pub struct McpServer {
    config: McpConfig,
    registry: Arc<ToolRegistry>,
    bridge: Arc<RequestBridge>,
}

impl McpServer {
    pub fn builder(config: BridgeConfig) -> ServerBuilder {
        let translator = SecurityTranslator::new(config.discovery.expose_auth_as_params);
        ServerBuilder {
            config,
            tools: RegistryBuilder::new(translator),
            gate: None,
        }
    }

    pub fn new(config: McpConfig, registry: ToolRegistry, bridge: RequestBridge) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            bridge: Arc::new(bridge),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Start the configured transport.
    pub async fn run(self: Arc<Self>) -> Result<(), McpError> {
        match self.config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => HttpServer::new(self).run().await,
        }
    }

    /// Run the server with stdio transport.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!(
            tools = self.registry.len(),
            "Starting MCP server with stdio transport"
        );
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC until the reader is exhausted.
    pub async fn serve_lines<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let context = CallContext::default();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(line, &context).await {
                let mut response_json = serde_json::to_string(&response)?;
                response_json.push('\n');
                writer.write_all(response_json.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Handle one raw JSON-RPC message.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str, context: &CallContext) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting unparseable message");
                return Some(JsonRpcResponse::error(
                    None,
                    ErrorCode::ParseError,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let id = value.get("id").cloned().filter(|id| !id.is_null());
        let request = match parse_envelope(value) {
            Ok(request) => request,
            Err(reason) => {
                tracing::debug!(%reason, "Rejecting invalid request");
                return Some(JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidRequest,
                    format!("Invalid request: {reason}"),
                ));
            }
        };

        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }
        Some(self.handle_request(request, context).await)
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        context: &CallContext,
    ) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params, context).await,
            _ => JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let info = ServerInfo {
            name: self.config.server_name.clone(),
            version: self.config.version().to_string(),
        };
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": info,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ListToolsResponse {
            tools: self.registry.definitions(),
        };
        match serde_json::to_value(result) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, ErrorCode::InternalError, e.to_string()),
        }
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        context: &CallContext,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        ErrorCode::InvalidParams,
                        format!("Invalid params: {e}"),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(id, ErrorCode::InvalidParams, "Missing params");
            }
        };

        let Some(tool) = self.registry.get(&params.name) else {
            return JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("Unknown tool: {}", params.name),
            );
        };

        match self.bridge.execute(tool, params.arguments, context).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::error(id, ErrorCode::InternalError, e.to_string()),
            },
            Err(error) => {
                tracing::info!(tool = %tool.name, %error, "Tool call failed");
                JsonRpcResponse::from_error(id, error.to_rpc_error())
            }
        }
    }
}

/// Check the JSON-RPC 2.0 envelope before deserializing it.
fn parse_envelope(value: Value) -> Result<JsonRpcRequest, String> {
    let Some(object) = value.as_object() else {
        return Err("message must be a JSON object".to_string());
    };
    if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err("jsonrpc must be \"2.0\"".to_string());
    }
    match object.get("method") {
        Some(Value::String(_)) => {}
        Some(_) => return Err("method must be a string".to_string()),
        None => return Err("missing method".to_string()),
    }
    if let Some(id) = object.get("id") {
        if !(id.is_string() || id.is_number() || id.is_null()) {
            return Err("id must be a string, number or null".to_string());
        }
    }
    if let Some(params) = object.get("params") {
        if !(params.is_object() || params.is_array() || params.is_null()) {
            return Err("params must be an object or array".to_string());
        }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}
