//! Shared fixtures for the end-to-end tests.
//!
//! The host application is a small in-memory "users" service built with
//! axum. Every handler records what it received so tests can assert on the
//! exact HTTP request a tool call was translated into.

#![allow(dead_code)]

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use toolbridge_core::{
    BridgeConfig, CommittedRoutes, FieldKind, FieldSchema, RouteCatalog, RouteDescriptor,
    RouteMethod, SecurityScheme, ValidationSchema,
};
use toolbridge_mcp::access::AUTHENTICATED;
use toolbridge_mcp::http_transport::mount;
use toolbridge_mcp::{
    AccessGate, CallContext, ContextInput, ManualTool, McpServer, SecurityContext,
    ToolCallOrigin, ToolError, ToolInvocation, enforce_permissions,
};

// =============================================================================
// CREDENTIALS
// =============================================================================

pub const ALICE_TOKEN: &str = "alice-token";
pub const ADMIN_TOKEN: &str = "admin-token";

/// `alice:secret`
pub const ALICE_BASIC: &str = "YWxpY2U6c2VjcmV0";

/// Per-request host state that must reach sub-requests unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOfWork(pub u64);

/// Resolve the caller from the `Authorization` header.
pub fn resolve_context(input: &ContextInput<'_>) -> SecurityContext {
    let Some(header) = input
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return SecurityContext::anonymous();
    };

    match header {
        "Bearer alice-token" => SecurityContext::for_principal("alice").with_permission("view_users"),
        "Bearer admin-token" => SecurityContext::for_principal("admin")
            .with_permission("admin_access")
            .with_permission("edit_users"),
        h if h == format!("Basic {ALICE_BASIC}") => SecurityContext::for_principal("alice"),
        _ => SecurityContext::anonymous(),
    }
}

pub fn bearer(token: &str) -> CallContext {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).unwrap();
    CallContext::default().with_header("authorization", value)
}

// =============================================================================
// RECORDING HOST
// =============================================================================

/// One request as seen by a host handler.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub origin: Option<String>,
    pub unit_of_work: Option<UnitOfWork>,
    pub principal: Option<String>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    fn push(&self, entry: Recorded) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn last(&self) -> Option<Recorded> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

async fn record(State(recorder): State<Recorder>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let body: Option<Value> = serde_json::from_slice(&bytes).ok();

    let entry = Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers.clone(),
        body: body.clone(),
        origin: parts
            .extensions
            .get::<ToolCallOrigin>()
            .map(|o| o.tool.clone()),
        unit_of_work: parts.extensions.get::<UnitOfWork>().copied(),
        principal: parts
            .extensions
            .get::<SecurityContext>()
            .and_then(|c| c.principal.clone()),
    };
    recorder.push(entry);

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "body": body,
    }))
    .into_response()
}

async fn failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "database unavailable"})),
    )
        .into_response()
}

async fn conflict() -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({"error": "email already taken"})),
    )
        .into_response()
}

async fn notes() -> &'static str {
    "remember the milk"
}

// =============================================================================
// ROUTES
// =============================================================================

pub fn user_schema() -> ValidationSchema {
    ValidationSchema::new()
        .field(FieldSchema::required("name", FieldKind::String).with_description("Display name"))
        .field(FieldSchema::optional("age", FieldKind::Integer).with_default(json!(18)))
}

/// The host's committed route catalog.
pub fn host_routes() -> CommittedRoutes {
    let mut catalog = RouteCatalog::new();
    catalog
        .add_route(
            RouteDescriptor::new("users", "/users")
                .method(RouteMethod::get().describe("List users"))
                .method(
                    RouteMethod::post()
                        .validation(user_schema())
                        .describe("Create a user"),
                )
                .method(RouteMethod::new("OPTIONS"))
                .method(RouteMethod::new("HEAD")),
        )
        .add_route(
            RouteDescriptor::new("user", "/users/{id}")
                .method(
                    RouteMethod::get()
                        .param("id", "i64")
                        .permission(AUTHENTICATED),
                )
                .method(
                    RouteMethod::put()
                        .param("id", "i64")
                        .validation(
                            ValidationSchema::new()
                                .field(FieldSchema::required("name", FieldKind::String)),
                        )
                        .permission("edit_users"),
                )
                .method(
                    RouteMethod::delete()
                        .param("id", "i64")
                        .permission("admin_access")
                        .context_hint("Deleted users cannot be restored"),
                ),
        )
        .add_route(
            RouteDescriptor::new("account", "/accounts/{id}").method(
                RouteMethod::put().validation(
                    ValidationSchema::new()
                        .field(FieldSchema::required("id", FieldKind::Integer))
                        .field(FieldSchema::required("name", FieldKind::String)),
                ),
            ),
        )
        .add_route(RouteDescriptor::new("search", "/search").method(RouteMethod::get()))
        .add_route(
            RouteDescriptor::new("reports", "/reports")
                .method(RouteMethod::get().security(SecurityScheme::Bearer)),
        )
        .add_route(
            RouteDescriptor::new("vault", "/vault")
                .method(RouteMethod::get().security(SecurityScheme::Basic)),
        )
        .add_route(
            RouteDescriptor::new("admin_stats", "/admin/stats")
                .method(RouteMethod::get().permission("admin_access")),
        )
        .add_route(RouteDescriptor::new("failures", "/failures").method(RouteMethod::get()))
        .add_route(RouteDescriptor::new("conflicts", "/conflicts").method(RouteMethod::get()))
        .add_route(RouteDescriptor::new("notes", "/notes").method(RouteMethod::get()))
        .add_route(RouteDescriptor::new("ghosts", "/ghosts").method(RouteMethod::get()));
    catalog.commit()
}

/// The host router with permissions enforced by `gate`.
pub fn host_router(gate: AccessGate, recorder: Recorder) -> Router {
    Router::new()
        .route("/users", get(record).post(record))
        .route("/users/{id}", get(record).put(record).delete(record))
        .route("/accounts/{id}", axum::routing::put(record))
        .route("/search", get(record))
        .route("/reports", get(record))
        .route("/vault", get(record))
        .route("/admin/stats", get(record))
        .route("/failures", get(failure))
        .route("/conflicts", get(conflict))
        .route("/notes", get(notes))
        .route_layer(middleware::from_fn_with_state(gate, enforce_permissions))
        .with_state(recorder)
}

// =============================================================================
// MANUAL TOOLS
// =============================================================================

pub fn admin_report_tool() -> ManualTool {
    ManualTool::new("admin_report")
        .description("Summarize account activity")
        .permission("admin_access")
        .handler(|inv: ToolInvocation| async move {
            let principal = inv.security.and_then(|c| c.principal);
            Ok::<_, ToolError>(json!({ "generated_by": principal }))
        })
}

pub fn echo_tool() -> ManualTool {
    ManualTool::new("echo")
        .description("Echo the arguments back")
        .schema(json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"]
        }))
        .handler(|inv: ToolInvocation| async move {
            let unit = inv.context.extensions.get::<UnitOfWork>().map(|u| u.0);
            Ok::<_, ToolError>(json!({
                "message": inv.arguments.get("message"),
                "unit_of_work": unit,
            }))
        })
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub struct TestContext {
    pub server: Arc<McpServer>,
    pub recorder: Recorder,
    /// Host router with the MCP endpoint mounted.
    pub app: Router,
}

impl TestContext {
    pub fn setup() -> Self {
        Self::build(BridgeConfig::default(), Vec::new())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self::build(config, Vec::new())
    }

    /// Build a context with extra manual tools registered after the defaults.
    pub fn build(config: BridgeConfig, extra: Vec<ManualTool>) -> Self {
        let routes = host_routes();
        let recorder = Recorder::default();
        let gate = AccessGate::new(&routes, resolve_context);
        let host = host_router(gate.clone(), recorder.clone());

        let mut builder = McpServer::builder(config)
            .tool(admin_report_tool())
            .tool(echo_tool())
            .gate(gate);
        for tool in extra {
            builder = builder.tool(tool);
        }
        let server = Arc::new(builder.build(&routes, host.clone()).unwrap());
        let app = mount(host, server.clone());

        Self {
            server,
            recorder,
            app,
        }
    }

    /// Send a raw JSON-RPC message.
    pub async fn rpc(&self, raw: &str, context: &CallContext) -> Option<Value> {
        self.server
            .handle_message(raw, context)
            .await
            .map(|response| serde_json::to_value(response).unwrap())
    }

    /// Call a tool without inbound credentials.
    pub async fn call(&self, tool: &str, arguments: Value) -> Value {
        self.call_with(&CallContext::default(), tool, arguments).await
    }

    pub async fn call_with(&self, context: &CallContext, tool: &str, arguments: Value) -> Value {
        let message = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments }
        });
        self.rpc(&message.to_string(), context).await.unwrap()
    }

    pub async fn list_tools_raw(&self) -> String {
        let response = self
            .rpc(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
                &CallContext::default(),
            )
            .await
            .unwrap();
        serde_json::to_string(&response["result"]).unwrap()
    }

    pub async fn tool_names(&self) -> Vec<String> {
        let raw = self.list_tools_raw().await;
        let result: Value = serde_json::from_str(&raw).unwrap();
        result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }
}

// =============================================================================
// ASSERTIONS
// =============================================================================

/// First content item of a successful call.
pub fn content(response: &Value) -> &Value {
    assert!(
        response.get("error").is_none(),
        "expected success, got {response}"
    );
    &response["result"]["content"][0]
}

/// JSON payload of a successful call.
pub fn content_json(response: &Value) -> &Value {
    let item = content(response);
    assert_eq!(item["type"], "json", "expected json content, got {item}");
    &item["json"]
}

/// Assert the response is an error with `code` and return its `data`.
pub fn expect_error(response: &Value, code: i64) -> &Value {
    assert_eq!(
        response["error"]["code"], code,
        "expected error {code}, got {response}"
    );
    &response["error"]["data"]
}
