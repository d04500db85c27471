//! Run command for serving the demo host.
//!
//! `toolbridge run` - Serve the host routes and the MCP endpoint over HTTP.
//! `toolbridge run --stdio` - Speak MCP over stdin/stdout instead.

use super::{assemble, load_config};
use crate::demo::UserStore;
use anyhow::Result;
use std::path::PathBuf;
use toolbridge_core::Transport;
use toolbridge_mcp::http_transport::HttpServer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Command-line overrides for `toolbridge run`.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub stdio: bool,
    pub http: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub async fn run(options: RunOptions) -> Result<()> {
    let mut config = load_config(options.config.as_deref())?;

    // --http wins when both flags are given
    if options.http {
        config.mcp.transport = Transport::Http;
    } else if options.stdio {
        config.mcp.transport = Transport::Stdio;
    }
    if let Some(host) = options.host {
        config.mcp.host = host;
    }
    if let Some(port) = options.port {
        config.mcp.port = port;
    }
    config.validate()?;

    let transport = config.mcp.transport;
    let (server, host) = assemble(config, UserStore::seeded().await)?;
    info!(
        tools = server.registry().len(),
        shadowed = server.registry().shadowed(),
        transport = ?transport,
        "Tool registry ready"
    );

    match transport {
        Transport::Stdio => {
            tokio::select! {
                result = server.run_stdio() => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
        Transport::Http => {
            let http = HttpServer::new(server).with_host(host.layer(TraceLayer::new_for_http()));
            tokio::select! {
                result = http.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
    }

    Ok(())
}
