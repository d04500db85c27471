//! Route discovery as seen through `tools/list`.

use crate::common::*;
use serde_json::{json, Value};
use toolbridge_core::{BridgeConfig, DiscoveryConfig};
use toolbridge_mcp::ManualTool;

const ALL_TOOLS: &[&str] = &[
    "admin_report",
    "echo",
    "list_users",
    "create_user",
    "get_user",
    "update_user",
    "delete_user",
    "update_account",
    "list_search",
    "list_reports",
    "list_vault",
    "list_admin_stats",
    "list_failures",
    "list_conflicts",
    "list_notes",
    "list_ghosts",
];

async fn tool(ctx: &TestContext, name: &str) -> Value {
    let raw = ctx.list_tools_raw().await;
    let result: Value = serde_json::from_str(&raw).unwrap();
    result["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == name)
        .cloned()
        .unwrap_or_else(|| panic!("tool {name} not listed"))
}

// =============================================================================
// NAMING AND ORDER
// =============================================================================

pub async fn test_tool_names_and_order(ctx: &TestContext) {
    println!("  🧪 test_tool_names_and_order");
    assert_eq!(ctx.tool_names().await, ALL_TOOLS);
}

pub async fn test_options_and_head_not_exposed(ctx: &TestContext) {
    println!("  🧪 test_options_and_head_not_exposed");
    let names = ctx.tool_names().await;
    assert!(!names.iter().any(|n| n.starts_with("options_") || n.starts_with("head_")));
}

pub async fn test_listing_is_byte_identical(ctx: &TestContext) {
    println!("  🧪 test_listing_is_byte_identical");
    let first = ctx.list_tools_raw().await;
    let second = ctx.list_tools_raw().await;
    assert_eq!(first, second);

    // A second server over the same catalog publishes the same bytes.
    let other = TestContext::setup();
    assert_eq!(first, other.list_tools_raw().await);
}

// =============================================================================
// SCHEMAS
// =============================================================================

pub async fn test_create_user_schema(ctx: &TestContext) {
    println!("  🧪 test_create_user_schema");
    let tool = tool(ctx, "create_user").await;
    let schema = &tool["inputSchema"];

    assert_eq!(tool["description"], "Create a user");
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["name"]["type"], "string");
    assert_eq!(schema["properties"]["age"]["type"], "integer");
    assert_eq!(schema["properties"]["age"]["default"], 18);
    assert_eq!(schema["required"], json!(["name"]));
    assert!(schema["properties"].get("querystring").is_none());
}

pub async fn test_item_route_schema(ctx: &TestContext) {
    println!("  🧪 test_item_route_schema");
    let tool = tool(ctx, "get_user").await;
    let schema = &tool["inputSchema"];

    assert_eq!(schema["properties"]["id"]["type"], "integer");
    assert_eq!(schema["required"], json!(["id"]));
    assert_eq!(schema["properties"]["querystring"]["type"], "object");
    assert_eq!(tool["annotations"]["readOnlyHint"], true);
}

pub async fn test_delete_annotations(ctx: &TestContext) {
    println!("  🧪 test_delete_annotations");
    let tool = tool(ctx, "delete_user").await;
    assert_eq!(tool["annotations"]["destructiveHint"], true);
    assert_eq!(
        tool["annotations"]["llmContextHint"],
        "Deleted users cannot be restored"
    );
}

pub async fn test_bearer_route_advertises_auth_token(ctx: &TestContext) {
    println!("  🧪 test_bearer_route_advertises_auth_token");
    let schema = tool(ctx, "list_reports").await["inputSchema"].clone();
    assert_eq!(schema["properties"]["auth_token"]["type"], "string");
    assert!(schema["required"].as_array().unwrap().contains(&json!("auth_token")));

    let schema = tool(ctx, "list_vault").await["inputSchema"].clone();
    let required = schema["required"].as_array().unwrap();
    assert!(required.contains(&json!("username")));
    assert!(required.contains(&json!("password")));
}

pub async fn test_hidden_auth_params() {
    println!("  🧪 test_hidden_auth_params");
    let config = BridgeConfig {
        discovery: DiscoveryConfig {
            expose_auth_as_params: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = TestContext::with_config(config);
    let schema = tool(&ctx, "list_reports").await["inputSchema"].clone();
    assert!(schema["properties"].get("auth_token").is_none());
}

// =============================================================================
// FILTERS AND COLLISIONS
// =============================================================================

pub async fn test_include_exclude_filters() {
    println!("  🧪 test_include_exclude_filters");
    let config = BridgeConfig {
        discovery: DiscoveryConfig {
            include: vec!["users*".to_string(), "/admin/*".to_string()],
            exclude: vec!["/users/{id}".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = TestContext::with_config(config);
    assert_eq!(
        ctx.tool_names().await,
        ["admin_report", "echo", "list_users", "create_user", "list_admin_stats"]
    );
}

pub async fn test_discovery_disabled_keeps_manual_tools() {
    println!("  🧪 test_discovery_disabled_keeps_manual_tools");
    let config = BridgeConfig {
        discovery: DiscoveryConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = TestContext::with_config(config);
    assert_eq!(ctx.tool_names().await, ["admin_report", "echo"]);
}

pub async fn test_manual_tool_shadows_discovered() {
    println!("  🧪 test_manual_tool_shadows_discovered");
    let shadow = ManualTool::new("list_users")
        .description("Cached user listing")
        .handler(|_| async { Ok::<_, toolbridge_mcp::ToolError>(json!(["cached"])) });
    let ctx = TestContext::build(BridgeConfig::default(), vec![shadow]);

    assert_eq!(ctx.server.registry().shadowed(), 1);
    let names = ctx.tool_names().await;
    assert_eq!(names.iter().filter(|n| *n == "list_users").count(), 1);
    assert_eq!(names[2], "list_users");

    let response = ctx.call("list_users", json!({})).await;
    assert_eq!(content_json(&response), &json!(["cached"]));
    assert_eq!(ctx.recorder.len(), 0);
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n🔎 Running Discovery Tests\n");

    test_tool_names_and_order(ctx).await;
    test_options_and_head_not_exposed(ctx).await;
    test_listing_is_byte_identical(ctx).await;

    test_create_user_schema(ctx).await;
    test_item_route_schema(ctx).await;
    test_delete_annotations(ctx).await;
    test_bearer_route_advertises_auth_token(ctx).await;
    test_hidden_auth_params().await;

    test_include_exclude_filters().await;
    test_discovery_disabled_keeps_manual_tools().await;
    test_manual_tool_shadows_discovered().await;

    println!("\n✅ All discovery tests passed!\n");
}
