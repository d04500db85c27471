//! Tools introspection commands.
//!
//! `toolbridge tools list` - List the tools the demo host publishes (offline).
//! `toolbridge tools describe` - Show the input schema for a specific tool.
//!
//! Both go through the same registry the server seals at startup, so the
//! output matches `tools/list`.

use super::{assemble, load_config};
use crate::demo::UserStore;
use anyhow::Result;
use std::path::PathBuf;
use toolbridge_mcp::ToolDefinition;

async fn definitions(config_path: Option<PathBuf>) -> Result<Vec<ToolDefinition>> {
    let config = load_config(config_path.as_deref())?;
    let (server, _) = assemble(config, UserStore::default())?;
    Ok(server.registry().definitions())
}

fn badges(tool: &ToolDefinition) -> Vec<&'static str> {
    let annotations = tool.annotations.as_ref();
    let mut badges = Vec::new();
    if annotations.is_some_and(|a| a.read_only == Some(true)) {
        badges.push("read");
    } else {
        badges.push("write");
    }
    if annotations.is_some_and(|a| a.destructive == Some(true)) {
        badges.push("destructive");
    }
    if annotations.is_some_and(|a| a.llm_context_hint.is_some()) {
        badges.push("hint");
    }
    badges
}

/// List the published tools.
pub async fn list(config_path: Option<PathBuf>, verbose: bool) -> Result<()> {
    let tools = definitions(config_path).await?;

    println!("\n🔧 Available Tools ({}):", tools.len());
    for tool in &tools {
        println!("   • {} ({})", tool.name, badges(tool).join(", "));

        if let Some(desc) = &tool.description {
            println!("     {}", desc);
        }

        if verbose {
            println!(
                "     Schema: {}",
                serde_json::to_string_pretty(&tool.input_schema)?
            );
        }
    }
    println!();

    Ok(())
}

/// Show detailed schema for a specific tool.
pub async fn describe(config_path: Option<PathBuf>, tool_name: String) -> Result<()> {
    let tools = definitions(config_path).await?;

    let tool = tools
        .iter()
        .find(|t| t.name == tool_name)
        .ok_or_else(|| anyhow::anyhow!("Tool '{}' not found", tool_name))?;

    println!("\nTool: {}", tool.name);

    if let Some(desc) = &tool.description {
        println!("\nDescription: {}", desc);
    }

    println!("\nInput Schema:");
    println!("{}", serde_json::to_string_pretty(&tool.input_schema)?);

    if let Some(annotations) = &tool.annotations {
        println!("\nAnnotations:");
        if let Some(true) = annotations.read_only {
            println!("  • readOnly: true");
        }
        if let Some(true) = annotations.destructive {
            println!("  • destructive: true");
        }
        if let Some(hint) = &annotations.llm_context_hint {
            println!("  • llmContextHint: {}", hint);
        }
    }

    println!();

    Ok(())
}
