use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod demo;

use commands::run::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "toolbridge", version, about = "Expose HTTP routes as MCP tools")]
struct Cli {
    /// Configuration file (defaults to ./toolbridge.yaml when present)
    #[arg(long, short, global = true, env = "TOOLBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the demo users service with its MCP endpoint.
    Run {
        /// Speak MCP over stdin/stdout
        #[arg(long, default_value_t = false)]
        stdio: bool,

        /// Serve MCP over HTTP (overrides --stdio)
        #[arg(long, default_value_t = false)]
        http: bool,

        /// Bind address for the HTTP transport
        #[arg(long)]
        host: Option<String>,

        /// Port for the HTTP transport
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Inspect the tools the service publishes.
    Tools {
        #[command(subcommand)]
        cmd: ToolsCommand,
    },

    /// Validate the configuration against the service's routes.
    Check,
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List every published tool
    List {
        /// Print input schemas as well
        #[arg(long, short, default_value_t = false)]
        verbose: bool,
    },

    /// Describe one tool by name
    Describe { tool_name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC in stdio mode, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Run {
            stdio,
            http,
            host,
            port,
        } => {
            commands::run::run(RunOptions {
                config: cli.config,
                stdio,
                http,
                host,
                port,
            })
            .await?
        }

        Command::Tools { cmd } => match cmd {
            ToolsCommand::List { verbose } => commands::tools::list(cli.config, verbose).await?,
            ToolsCommand::Describe { tool_name } => {
                commands::tools::describe(cli.config, tool_name).await?
            }
        },

        Command::Check => commands::check::check(cli.config).await?,
    }

    Ok(())
}
