//! Permission enforcement shared by HTTP routes and tool calls.
//!
//! The host supplies two strategies: a [`ContextFactory`] that turns an
//! incoming request into a [`SecurityContext`], and an [`Authorizer`] that
//! decides whether that context holds a permission. [`AccessGate`] combines
//! them with a permission index built from the committed route catalog.
//! Both the [`enforce_permissions`] middleware and manual tool execution
//! call [`AccessGate::check`], so an agent never gets a different answer
//! than a browser would.

use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    http::{Extensions, HeaderMap, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use toolbridge_core::CommittedRoutes;

/// Permission satisfied by any identified principal.
pub const AUTHENTICATED: &str = "authenticated";

/// Who is calling and what they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    pub principal: Option<String>,
    pub permissions: BTreeSet<String>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// Request facts a [`ContextFactory`] may inspect.
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    /// Route name when known; the tool name for manual tools.
    pub route_name: Option<&'a str>,
    pub method: &'a str,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub extensions: &'a Extensions,
}

/// Host permission evaluator.
pub trait Authorizer: Send + Sync {
    fn permits(&self, context: &SecurityContext, permission: &str) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&SecurityContext, &str) -> bool + Send + Sync,
{
    fn permits(&self, context: &SecurityContext, permission: &str) -> bool {
        self(context, permission)
    }
}

/// Builds the security context for a request.
pub trait ContextFactory: Send + Sync {
    fn context_for(&self, input: &ContextInput<'_>) -> SecurityContext;
}

impl<F> ContextFactory for F
where
    F: for<'a> Fn(&ContextInput<'a>) -> SecurityContext + Send + Sync,
{
    fn context_for(&self, input: &ContextInput<'_>) -> SecurityContext {
        self(input)
    }
}

/// Grants exactly the permissions listed in the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantedPermissions;

impl Authorizer for GrantedPermissions {
    fn permits(&self, context: &SecurityContext, permission: &str) -> bool {
        context.permissions.contains(permission)
            || (permission == AUTHENTICATED && context.is_authenticated())
    }
}

/// Why a permission check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("authentication required for permission '{permission}'")]
    Unauthenticated { permission: String },

    #[error("permission '{permission}' denied")]
    Forbidden {
        permission: String,
        principal: Option<String>,
    },
}

impl AccessDenied {
    pub fn kind(&self) -> &'static str {
        match self {
            AccessDenied::Unauthenticated { .. } => "unauthenticated",
            AccessDenied::Forbidden { .. } => "forbidden",
        }
    }

    pub fn permission(&self) -> Option<&str> {
        match self {
            AccessDenied::Unauthenticated { permission }
            | AccessDenied::Forbidden { permission, .. } => Some(permission),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessDenied::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AccessDenied::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "permission": self.permission(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Clone)]
struct IndexedRoute {
    name: String,
    permission: Option<String>,
}

/// Effective permissions keyed by `(pattern, METHOD)`.
#[derive(Debug, Default)]
pub struct PermissionIndex {
    entries: HashMap<(String, String), IndexedRoute>,
}

impl PermissionIndex {
    pub fn build(routes: &CommittedRoutes) -> Self {
        let mut entries = HashMap::new();
        for route in routes.iter() {
            let methods = route
                .methods
                .iter()
                .map(|m| m.method_upper())
                .chain(route.service_permissions.keys().cloned());
            for method in methods {
                let permission = route.effective_permission(&method).map(str::to_string);
                entries
                    .entry((route.pattern.clone(), method))
                    .or_insert_with(|| IndexedRoute {
                        name: route.name.clone(),
                        permission,
                    });
            }
        }
        Self { entries }
    }

    /// Route name and permission for a matched pattern and method.
    pub fn lookup(&self, pattern: &str, method: &str) -> Option<(&str, Option<&str>)> {
        let method = method.to_ascii_uppercase();
        let entry = self
            .entries
            .get(&(pattern.to_string(), method.clone()))
            .or_else(|| {
                (method == "HEAD")
                    .then(|| self.entries.get(&(pattern.to_string(), "GET".to_string())))
                    .flatten()
            })?;
        Some((entry.name.as_str(), entry.permission.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The single authorization path for routes and tools.
#[derive(Clone)]
pub struct AccessGate {
    authorizer: Arc<dyn Authorizer>,
    factory: Arc<dyn ContextFactory>,
    index: Arc<PermissionIndex>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("indexed_routes", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Gate using [`GrantedPermissions`] as the authorizer.
    pub fn new(routes: &CommittedRoutes, factory: impl ContextFactory + 'static) -> Self {
        Self {
            authorizer: Arc::new(GrantedPermissions),
            factory: Arc::new(factory),
            index: Arc::new(PermissionIndex::build(routes)),
        }
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    pub fn index(&self) -> &PermissionIndex {
        &self.index
    }

    /// Build the caller's context and test it against `permission`.
    pub fn check(
        &self,
        input: &ContextInput<'_>,
        permission: Option<&str>,
    ) -> Result<SecurityContext, AccessDenied> {
        let context = self.factory.context_for(input);
        let Some(permission) = permission else {
            return Ok(context);
        };

        if self.authorizer.permits(&context, permission) {
            return Ok(context);
        }

        tracing::debug!(
            permission,
            principal = context.principal.as_deref().unwrap_or("-"),
            uri = %input.uri,
            "Permission denied"
        );
        match context.principal {
            None => Err(AccessDenied::Unauthenticated {
                permission: permission.to_string(),
            }),
            principal @ Some(_) => Err(AccessDenied::Forbidden {
                permission: permission.to_string(),
                principal,
            }),
        }
    }
}

/// Axum middleware enforcing route permissions.
///
/// Install with `Router::route_layer` so that [`MatchedPath`] is available.
pub async fn enforce_permissions(
    State(gate): State<AccessGate>,
    mut req: Request,
    next: Next,
) -> Response {
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());
    let method = if req.method() == Method::HEAD {
        Method::GET
    } else {
        req.method().clone()
    };

    let (route_name, permission) = matched
        .as_deref()
        .and_then(|pattern| gate.index().lookup(pattern, method.as_str()))
        .map(|(name, permission)| (Some(name.to_string()), permission.map(str::to_string)))
        .unwrap_or((None, None));

    let input = ContextInput {
        route_name: route_name.as_deref(),
        method: method.as_str(),
        uri: req.uri(),
        headers: req.headers(),
        extensions: req.extensions(),
    };

    match gate.check(&input, permission.as_deref()) {
        Ok(context) => {
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        Err(denied) => denied.into_response(),
    }
}
