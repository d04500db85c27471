//! # toolbridge-mcp
//!
//! MCP (Model Context Protocol) server that exposes a host web
//! application's HTTP routes as typed tools for AI agents.
//!
//! - **Route Discovery**: every committed route × method becomes a tool
//!   with a generated JSON Schema
//! - **Manual Tools**: hand-written handlers registered next to the routes
//! - **Same Authorization**: tool calls run through the host's own
//!   middleware and the same [`AccessGate`] as browser requests
//! - **Multiple Transports**: stdio and HTTP
//!
//! ## Architecture
//!
//! ```text
//! AI Agent (Claude, GPT, etc.)
//!       │
//!       │ MCP protocol (list tools / call tool)
//!       ▼
//! ┌────────────────────┐
//! │  McpServer         │
//! │  1. Look up tool   │  ← ToolRegistry (sealed at startup)
//! │  2. Validate auth  │  ← SecurityTranslator
//! │  3. Validate args  │  ← jsonschema
//! │  4. Build request  │  ← RequestBridge
//! │  5. Dispatch       │
//! │  6. Return content │
//! └─────────┬──────────┘
//!           │ internal HTTP request
//!           ▼
//!    Host axum Router (middleware + handlers)
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use toolbridge_core::{BridgeConfig, RouteCatalog, RouteDescriptor, RouteMethod};
//! use toolbridge_mcp::{AccessGate, McpServer};
//!
//! let mut catalog = RouteCatalog::new();
//! catalog.add_route(RouteDescriptor::new("users", "/users").method(RouteMethod::get()));
//! let routes = catalog.commit();
//!
//! let gate = AccessGate::new(&routes, |_: &ContextInput<'_>| SecurityContext::anonymous());
//! let server = McpServer::builder(BridgeConfig::default())
//!     .gate(gate)
//!     .build(&routes, host_router)?;
//!
//! Arc::new(server).run().await?;
//! ```

pub mod access;
pub mod bridge;
pub mod discovery;
pub mod error;
pub mod http_transport;
pub mod protocol;
pub mod schema;
pub mod security;
pub mod server;
pub mod tools;

// Re-export main types
pub use access::{
    AccessDenied, AccessGate, Authorizer, ContextFactory, ContextInput, GrantedPermissions,
    SecurityContext, enforce_permissions,
};
pub use bridge::{CallContext, HostDispatch, RequestBridge, ToolCallOrigin};
pub use discovery::{DiscoveryReport, RouteDiscoverer, RouteInfo};
pub use error::{McpError, ToolError};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolAnnotations,
    ToolContent, ToolDefinition,
};
pub use schema::{GeneratedSchema, ParamOrigin, ParameterSpec};
pub use security::{AuthValidationError, SecurityTranslator};
pub use server::{McpServer, ServerBuilder};
pub use tools::{ManualTool, RegistryBuilder, Tool, ToolHandler, ToolInvocation, ToolRegistry};
