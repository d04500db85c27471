//! CLI command implementations for the toolbridge demo host.

pub mod check;
pub mod run;
pub mod tools;

use crate::demo::{self, UserStore};
use anyhow::{Context, Result};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use toolbridge_core::BridgeConfig;
use toolbridge_mcp::{AccessGate, McpServer};

/// Conventional configuration file name.
pub const DEFAULT_CONFIG: &str = "toolbridge.yaml";

/// Load configuration, falling back to defaults when the conventional file
/// is absent. An explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => BridgeConfig::from_file(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load configuration from {DEFAULT_CONFIG}")),
        None => {
            tracing::debug!("No {DEFAULT_CONFIG} found, using defaults");
            Ok(BridgeConfig::default())
        }
    }
}

/// Build the MCP server over the demo host and return it with the host router.
pub fn assemble(config: BridgeConfig, store: UserStore) -> Result<(Arc<McpServer>, Router)> {
    let routes = demo::routes();
    let gate = AccessGate::new(&routes, demo::resolve_context);
    let host = demo::router(store.clone(), gate.clone());

    let server = McpServer::builder(config)
        .tool(demo::stats_tool(store))
        .gate(gate)
        .build(&routes, host.clone())
        .context("Failed to build MCP server")?;

    Ok((Arc::new(server), host))
}
