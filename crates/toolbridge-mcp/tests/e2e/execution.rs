//! Translating tool calls into host requests and results back into content.

use crate::common::*;
use serde_json::json;
use toolbridge_mcp::CallContext;

const INVALID_PARAMS: i64 = -32602;
const METHOD_NOT_FOUND: i64 = -32601;
const INTERNAL_ERROR: i64 = -32603;

// =============================================================================
// REQUEST CONSTRUCTION
// =============================================================================

pub async fn test_create_user_fills_defaults(ctx: &TestContext) {
    println!("  🧪 test_create_user_fills_defaults");
    let response = ctx.call("create_user", json!({"name": "Ann"})).await;

    let result = content_json(&response);
    assert_eq!(result["method"], "POST");
    assert_eq!(result["body"], json!({"name": "Ann", "age": 18}));

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.path, "/users");
    assert_eq!(recorded.query, None);
    assert_eq!(recorded.body, Some(json!({"name": "Ann", "age": 18})));
    assert_eq!(recorded.header("content-type"), Some("application/json"));
    assert_eq!(recorded.origin.as_deref(), Some("create_user"));
}

pub async fn test_explicit_value_beats_default(ctx: &TestContext) {
    println!("  🧪 test_explicit_value_beats_default");
    ctx.call("create_user", json!({"name": "Bo", "age": 40})).await;
    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.body, Some(json!({"name": "Bo", "age": 40})));
}

pub async fn test_querystring_object_flattened(ctx: &TestContext) {
    println!("  🧪 test_querystring_object_flattened");
    let response = ctx
        .call("list_search", json!({"querystring": {"page": 3, "limit": 50}}))
        .await;
    content_json(&response);

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.path, "/search");
    assert_eq!(recorded.query.as_deref(), Some("page=3&limit=50"));
    assert_eq!(recorded.body, None);
}

pub async fn test_querystring_on_body_method(ctx: &TestContext) {
    println!("  🧪 test_querystring_on_body_method");
    ctx.call(
        "create_user",
        json!({"name": "Ann", "querystring": {"page": 3, "limit": 50}}),
    )
    .await;

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.query.as_deref(), Some("page=3&limit=50"));
    assert_eq!(recorded.body, Some(json!({"name": "Ann", "age": 18})));
}

pub async fn test_querystring_text_flattened(ctx: &TestContext) {
    println!("  🧪 test_querystring_text_flattened");
    ctx.call("list_search", json!({"querystring": "page=3&limit=50"}))
        .await;
    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.query.as_deref(), Some("page=3&limit=50"));
}

pub async fn test_explicit_query_argument_wins(ctx: &TestContext) {
    println!("  🧪 test_explicit_query_argument_wins");
    ctx.call(
        "list_search",
        json!({"page": 1, "querystring": {"page": 3, "limit": 50}}),
    )
    .await;
    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.query.as_deref(), Some("page=1&limit=50"));
}

pub async fn test_path_parameter_substituted(ctx: &TestContext) {
    println!("  🧪 test_path_parameter_substituted");
    let response = ctx
        .call_with(&bearer(ALICE_TOKEN), "get_user", json!({"id": 7}))
        .await;
    assert_eq!(content_json(&response)["path"], "/users/7");

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.method, "GET");
    assert_eq!(recorded.path, "/users/7");
    assert_eq!(recorded.principal.as_deref(), Some("alice"));
}

pub async fn test_path_and_body_share_a_field(ctx: &TestContext) {
    println!("  🧪 test_path_and_body_share_a_field");
    let response = ctx
        .call("update_account", json!({"id": 7, "name": "Ops"}))
        .await;
    content_json(&response);

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.method, "PUT");
    assert_eq!(recorded.path, "/accounts/7");
    assert_eq!(recorded.body, Some(json!({"id": 7, "name": "Ops"})));

    // The declared integer kind applies to the shared field.
    let before = ctx.recorder.len();
    let response = ctx
        .call("update_account", json!({"id": "7", "name": "Ops"}))
        .await;
    let data = expect_error(&response, INVALID_PARAMS);
    assert_eq!(data["field"], "id");
    assert_eq!(ctx.recorder.len(), before);
}

// =============================================================================
// ARGUMENT VALIDATION
// =============================================================================

pub async fn test_missing_required_field(ctx: &TestContext) {
    println!("  🧪 test_missing_required_field");
    let before = ctx.recorder.len();
    let response = ctx.call("create_user", json!({"age": 30})).await;

    let data = expect_error(&response, INVALID_PARAMS);
    assert_eq!(data["field"], "name");
    assert_eq!(ctx.recorder.len(), before);
}

pub async fn test_wrong_type_rejected(ctx: &TestContext) {
    println!("  🧪 test_wrong_type_rejected");
    let before = ctx.recorder.len();
    let response = ctx.call("create_user", json!({"name": 5})).await;

    let data = expect_error(&response, INVALID_PARAMS);
    assert_eq!(data["field"], "name");
    assert_eq!(ctx.recorder.len(), before);
}

pub async fn test_non_object_arguments_rejected(ctx: &TestContext) {
    println!("  🧪 test_non_object_arguments_rejected");
    let response = ctx.call("create_user", json!(["Ann"])).await;
    expect_error(&response, INVALID_PARAMS);
}

pub async fn test_manual_tool_schema_enforced(ctx: &TestContext) {
    println!("  🧪 test_manual_tool_schema_enforced");
    let response = ctx.call("echo", json!({})).await;
    assert_eq!(expect_error(&response, INVALID_PARAMS)["field"], "message");

    let response = ctx.call("echo", json!({"message": "hi"})).await;
    assert_eq!(content_json(&response)["message"], "hi");
}

// =============================================================================
// CONTEXT PROPAGATION
// =============================================================================

pub async fn test_extensions_reach_host_handlers(ctx: &TestContext) {
    println!("  🧪 test_extensions_reach_host_handlers");
    let context = CallContext::default().with_extension(UnitOfWork(42));

    ctx.call_with(&context, "list_users", json!({})).await;
    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.unit_of_work, Some(UnitOfWork(42)));
    assert_eq!(recorded.origin.as_deref(), Some("list_users"));

    let response = ctx
        .call_with(&context, "echo", json!({"message": "tx"}))
        .await;
    assert_eq!(content_json(&response)["unit_of_work"], 42);
}

pub async fn test_inbound_headers_forwarded(ctx: &TestContext) {
    println!("  🧪 test_inbound_headers_forwarded");
    let context = CallContext::default()
        .with_header("x-request-id", "req-123".parse().unwrap());
    ctx.call_with(&context, "list_users", json!({})).await;

    let recorded = ctx.recorder.last().unwrap();
    assert_eq!(recorded.header("x-request-id"), Some("req-123"));
}

// =============================================================================
// RESULTS
// =============================================================================

pub async fn test_text_response_becomes_text_content(ctx: &TestContext) {
    println!("  🧪 test_text_response_becomes_text_content");
    let response = ctx.call("list_notes", json!({})).await;
    assert_eq!(
        content(&response),
        &json!({"type": "text", "text": "remember the milk"})
    );
    assert_eq!(response["result"]["isError"], false);
}

pub async fn test_context_hint_in_meta(ctx: &TestContext) {
    println!("  🧪 test_context_hint_in_meta");
    let response = ctx
        .call_with(&bearer(ADMIN_TOKEN), "delete_user", json!({"id": 3}))
        .await;
    content_json(&response);
    assert_eq!(
        response["result"]["_meta"]["llmContextHint"],
        "Deleted users cannot be restored"
    );
    assert_eq!(ctx.recorder.last().unwrap().method, "DELETE");
}

pub async fn test_server_error_maps_to_internal(ctx: &TestContext) {
    println!("  🧪 test_server_error_maps_to_internal");
    let response = ctx.call("list_failures", json!({})).await;
    let data = expect_error(&response, INTERNAL_ERROR);
    assert_eq!(data["status"], 500);
    assert_eq!(data["body"]["error"], "database unavailable");
}

pub async fn test_client_error_maps_to_invalid_params(ctx: &TestContext) {
    println!("  🧪 test_client_error_maps_to_invalid_params");
    let response = ctx.call("list_conflicts", json!({})).await;
    let data = expect_error(&response, INVALID_PARAMS);
    assert_eq!(data["status"], 409);
}

pub async fn test_unrouted_path_maps_to_method_not_found(ctx: &TestContext) {
    println!("  🧪 test_unrouted_path_maps_to_method_not_found");
    let response = ctx.call("list_ghosts", json!({})).await;
    let data = expect_error(&response, METHOD_NOT_FOUND);
    assert_eq!(data["status"], 404);
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n⚙️ Running Execution Tests\n");

    // Request construction
    test_create_user_fills_defaults(ctx).await;
    test_explicit_value_beats_default(ctx).await;
    test_querystring_object_flattened(ctx).await;
    test_querystring_text_flattened(ctx).await;
    test_querystring_on_body_method(ctx).await;
    test_explicit_query_argument_wins(ctx).await;
    test_path_parameter_substituted(ctx).await;
    test_path_and_body_share_a_field(ctx).await;

    // Argument validation
    test_missing_required_field(ctx).await;
    test_wrong_type_rejected(ctx).await;
    test_non_object_arguments_rejected(ctx).await;
    test_manual_tool_schema_enforced(ctx).await;

    // Context propagation
    test_extensions_reach_host_handlers(ctx).await;
    test_inbound_headers_forwarded(ctx).await;

    // Results
    test_text_response_becomes_text_content(ctx).await;
    test_context_hint_in_meta(ctx).await;
    test_server_error_maps_to_internal(ctx).await;
    test_client_error_maps_to_invalid_params(ctx).await;
    test_unrouted_path_maps_to_method_not_found(ctx).await;

    println!("\n✅ All execution tests passed!\n");
}
