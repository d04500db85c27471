//! MCP server configuration.
//!
//! This module defines how the tool bridge is exposed to agents: which
//! transport carries JSON-RPC, where the HTTP endpoint is mounted and how
//! the server identifies itself during `initialize`.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpConfig {
    /// Transport type: "stdio" or "http".
    #[serde(default)]
    pub transport: Transport,

    /// HTTP host (only used when transport is HTTP).
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP port (only used when transport is HTTP).
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Path the JSON-RPC endpoint is mounted at.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Name reported in `serverInfo`.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Version reported in `serverInfo`. Defaults to the crate version.
    #[serde(default)]
    pub server_version: Option<String>,
}

/// MCP transport type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Standard input/output transport (for desktop agent clients).
    #[default]
    Stdio,
    /// HTTP transport.
    Http,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_http_host(),
            port: default_http_port(),
            mount_path: default_mount_path(),
            server_name: default_server_name(),
            server_version: None,
        }
    }
}

impl McpConfig {
    /// Address to bind when serving over HTTP.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if using HTTP transport.
    pub fn is_http(&self) -> bool {
        self.transport == Transport::Http
    }

    /// Check if using stdio transport.
    pub fn is_stdio(&self) -> bool {
        self.transport == Transport::Stdio
    }

    /// Version string to report, falling back to this crate's version.
    pub fn version(&self) -> &str {
        self.server_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_mount_path() -> String {
    "/mcp".to_string()
}

fn default_server_name() -> String {
    "toolbridge".to_string()
}
