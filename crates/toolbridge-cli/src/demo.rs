//! In-memory users service the CLI serves and introspects.
//!
//! It is a regular axum application: routes are declared in a
//! [`RouteCatalog`], permissions are enforced by [`enforce_permissions`],
//! and the MCP endpoint is mounted next to the ordinary routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolbridge_core::{
    CommittedRoutes, RouteCatalog, RouteDescriptor, RouteMethod, SecurityScheme,
    ValidationSchema,
};
use toolbridge_mcp::access::AUTHENTICATED;
use toolbridge_mcp::{
    AccessGate, ContextInput, ManualTool, SecurityContext, ToolError, ToolInvocation,
    enforce_permissions,
};

/// Token granting every demo permission.
pub const ADMIN_TOKEN: &str = "demo-admin";
/// Token for an authenticated caller without extra permissions.
pub const READER_TOKEN: &str = "demo-reader";

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub age: Option<u32>,
}

/// Payload for creating a user.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateUser {
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    pub age: Option<u32>,
}

/// Payload for updating a user.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Default)]
struct Users {
    next_id: u64,
    rows: BTreeMap<u64, User>,
}

/// Shared user table.
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    inner: Arc<RwLock<Users>>,
}

impl UserStore {
    /// Store preloaded with a couple of users.
    pub async fn seeded() -> Self {
        let store = Self::default();
        for (name, email) in [("Ada", "ada@example.com"), ("Linus", "linus@example.com")] {
            store
                .insert(CreateUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    age: None,
                })
                .await;
        }
        store
    }

    async fn insert(&self, input: CreateUser) -> User {
        let mut users = self.inner.write().await;
        users.next_id += 1;
        let user = User {
            id: users.next_id,
            name: input.name,
            email: input.email,
            age: input.age,
        };
        users.rows.insert(user.id, user.clone());
        user
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// Route declarations of the demo service.
pub fn routes() -> CommittedRoutes {
    let mut catalog = RouteCatalog::new();
    catalog
        .add_route(
            RouteDescriptor::new("users", "/users")
                .method(RouteMethod::get().describe("List all users"))
                .method(
                    RouteMethod::post()
                        .validation(ValidationSchema::of::<CreateUser>())
                        .permission("manage_users")
                        .describe("Create a user"),
                ),
        )
        .add_route(
            RouteDescriptor::new("user", "/users/{id}")
                .default_permission(AUTHENTICATED)
                .method(
                    RouteMethod::get()
                        .param("id", "u64")
                        .describe("Fetch one user"),
                )
                .method(
                    RouteMethod::patch()
                        .param("id", "u64")
                        .validation(ValidationSchema::of::<UpdateUser>())
                        .permission("manage_users")
                        .describe("Change some fields of a user"),
                )
                .method(
                    RouteMethod::delete()
                        .param("id", "u64")
                        .permission("manage_users")
                        .describe("Delete a user")
                        .context_hint("Deletion is permanent; confirm with the user first"),
                ),
        )
        .add_route(
            RouteDescriptor::new("profile", "/profile").method(
                RouteMethod::get()
                    .security(SecurityScheme::Bearer)
                    .permission(AUTHENTICATED)
                    .describe("Profile of the calling principal"),
            ),
        );
    catalog.commit()
}

/// Resolve demo tokens into security contexts.
pub fn resolve_context(input: &ContextInput<'_>) -> SecurityContext {
    let token = input
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(ADMIN_TOKEN) => SecurityContext::for_principal("admin")
            .with_permission("manage_users")
            .with_permission("admin_access"),
        Some(READER_TOKEN) => SecurityContext::for_principal("reader"),
        _ => SecurityContext::anonymous(),
    }
}

/// The demo router with permissions enforced by `gate`.
pub fn router(store: UserStore, gate: AccessGate) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(gate, enforce_permissions))
        .with_state(store)
}

/// Manual tool summarizing the store.
pub fn stats_tool(store: UserStore) -> ManualTool {
    ManualTool::new("user_stats")
        .description("Count the users in the directory")
        .permission("admin_access")
        .handler(move |_: ToolInvocation| {
            let store = store.clone();
            async move {
                let total = store.len().await;
                Ok::<_, ToolError>(json!({ "total_users": total }))
            }
        })
}

// =============================================================================
// HANDLERS
// =============================================================================

fn not_found(id: u64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("user {id} not found") })),
    )
        .into_response()
}

async fn list_users(State(store): State<UserStore>) -> Json<Vec<User>> {
    let users = store.inner.read().await;
    Json(users.rows.values().cloned().collect())
}

async fn create_user(State(store): State<UserStore>, Json(input): Json<CreateUser>) -> Response {
    let user = store.insert(input).await;
    tracing::info!(id = user.id, "User created");
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_user(State(store): State<UserStore>, Path(id): Path<u64>) -> Response {
    match store.inner.read().await.rows.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => not_found(id),
    }
}

async fn update_user(
    State(store): State<UserStore>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateUser>,
) -> Response {
    let mut users = store.inner.write().await;
    let Some(user) = users.rows.get_mut(&id) else {
        return not_found(id);
    };
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(email) = input.email {
        user.email = email;
    }
    if input.age.is_some() {
        user.age = input.age;
    }
    Json(user.clone()).into_response()
}

async fn delete_user(State(store): State<UserStore>, Path(id): Path<u64>) -> Response {
    match store.inner.write().await.rows.remove(&id) {
        Some(_) => {
            tracing::info!(id, "User deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(id),
    }
}

async fn profile(Extension(context): Extension<SecurityContext>) -> Json<serde_json::Value> {
    Json(json!({ "principal": context.principal }))
}
