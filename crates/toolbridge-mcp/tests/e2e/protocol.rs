//! JSON-RPC envelope handling and the HTTP transport.

use crate::common::*;
use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use serde_json::{json, Value};
use toolbridge_mcp::CallContext;
use tower::ServiceExt;

async fn post_mcp(ctx: &TestContext, body: &str, authorization: Option<&str>) -> (StatusCode, Value) {
    let mut request = HttpRequest::post("/mcp").header("content-type", "application/json");
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }
    let response = ctx
        .app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// =============================================================================
// ENVELOPES
// =============================================================================

pub async fn test_initialize(ctx: &TestContext) {
    println!("  🧪 test_initialize");
    let response = ctx
        .rpc(
            r#"{"jsonrpc":"2.0","id":"init","method":"initialize","params":{}}"#,
            &CallContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(response["id"], "init");
    assert_eq!(response["result"]["serverInfo"]["name"], "toolbridge");
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
}

pub async fn test_unknown_tool(ctx: &TestContext) {
    println!("  🧪 test_unknown_tool");
    let before = ctx.recorder.len();
    let response = ctx.call("nonexistent_tool", json!({})).await;

    expect_error(&response, -32601);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("nonexistent_tool")
    );
    assert_eq!(ctx.recorder.len(), before);
}

pub async fn test_unknown_method(ctx: &TestContext) {
    println!("  🧪 test_unknown_method");
    let response = ctx
        .rpc(
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#,
            &CallContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(response["id"], 7);
    expect_error(&response, -32601);
}

pub async fn test_malformed_messages(ctx: &TestContext) {
    println!("  🧪 test_malformed_messages");
    let context = CallContext::default();

    let response = ctx.rpc("{not json", &context).await.unwrap();
    expect_error(&response, -32700);
    assert_eq!(response["id"], Value::Null);

    let response = ctx
        .rpc(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#, &context)
        .await
        .unwrap();
    expect_error(&response, -32600);

    let response = ctx
        .rpc(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#, &context)
        .await
        .unwrap();
    expect_error(&response, -32600);

    let response = ctx
        .rpc(r#"{"jsonrpc":"2.0","id":2,"method":"tools/call"}"#, &context)
        .await
        .unwrap();
    expect_error(&response, -32602);
}

pub async fn test_notifications_get_no_reply(ctx: &TestContext) {
    println!("  🧪 test_notifications_get_no_reply");
    let before = ctx.recorder.len();
    let reply = ctx
        .rpc(
            r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"list_users"}}"#,
            &CallContext::default(),
        )
        .await;
    assert!(reply.is_none());
    assert_eq!(ctx.recorder.len(), before);
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

pub async fn test_http_round_trip(ctx: &TestContext) {
    println!("  🧪 test_http_round_trip");
    let (status, body) = post_mcp(
        ctx,
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_user","arguments":{"id":5}}}"#,
        Some("Bearer alice-token"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["content"][0]["json"]["path"], "/users/5");

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.principal.as_deref(), Some("alice"));
    assert_eq!(recorded.origin.as_deref(), Some("get_user"));
}

pub async fn test_http_tools_list(ctx: &TestContext) {
    println!("  🧪 test_http_tools_list");
    let (status, body) = post_mcp(
        ctx,
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::to_string(&body["result"]).unwrap(),
        ctx.list_tools_raw().await
    );
}

pub async fn test_http_notification_accepted(ctx: &TestContext) {
    println!("  🧪 test_http_notification_accepted");
    let (status, body) = post_mcp(
        ctx,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}

pub async fn test_host_routes_still_served(ctx: &TestContext) {
    println!("  🧪 test_host_routes_still_served");
    let response = ctx
        .app
        .clone()
        .oneshot(HttpRequest::get("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.origin, None);
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n📡 Running Protocol Tests\n");

    // Envelopes
    test_initialize(ctx).await;
    test_unknown_tool(ctx).await;
    test_unknown_method(ctx).await;
    test_malformed_messages(ctx).await;
    test_notifications_get_no_reply(ctx).await;

    // HTTP transport
    test_http_round_trip(ctx).await;
    test_http_tools_list(ctx).await;
    test_http_notification_accepted(ctx).await;
    test_host_routes_still_served(ctx).await;

    println!("\n✅ All protocol tests passed!\n");
}
