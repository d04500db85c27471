//! Host route catalog.
//!
//! The host application declares its routes here while it is being
//! configured. Once configuration is complete the catalog is committed into
//! an immutable [`CommittedRoutes`] snapshot; only a committed snapshot can
//! be handed to route discovery, so discovery can never observe a
//! half-built catalog.

use crate::validation::ValidationSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a route expects callers to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `Authorization: Basic <base64(username:password)>`.
    Basic,
}

/// A handler parameter and its textual type hint (e.g. `"int"`, `"Option<u64>"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerParam {
    pub name: String,
    pub type_hint: String,
}

/// Metadata for one HTTP method of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMethod {
    /// Method token as declared; compared case-insensitively.
    pub method: String,
    pub permission: Option<String>,
    pub validation: Option<ValidationSchema>,
    pub description: Option<String>,
    pub params: Vec<HandlerParam>,
    pub security: Option<SecurityScheme>,
    pub llm_context_hint: Option<String>,
}

impl RouteMethod {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            permission: None,
            validation: None,
            description: None,
            params: Vec::new(),
            security: None,
            llm_context_hint: None,
        }
    }

    pub fn get() -> Self {
        Self::new("GET")
    }

    pub fn post() -> Self {
        Self::new("POST")
    }

    pub fn put() -> Self {
        Self::new("PUT")
    }

    pub fn patch() -> Self {
        Self::new("PATCH")
    }

    pub fn delete() -> Self {
        Self::new("DELETE")
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn validation(mut self, schema: ValidationSchema) -> Self {
        self.validation = Some(schema);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a handler parameter type hint.
    pub fn param(mut self, name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        self.params.push(HandlerParam {
            name: name.into(),
            type_hint: type_hint.into(),
        });
        self
    }

    pub fn security(mut self, scheme: SecurityScheme) -> Self {
        self.security = Some(scheme);
        self
    }

    pub fn context_hint(mut self, hint: impl Into<String>) -> Self {
        self.llm_context_hint = Some(hint.into());
        self
    }

    /// Upper-cased method token.
    pub fn method_upper(&self) -> String {
        self.method.trim().to_ascii_uppercase()
    }
}

/// A registered route: symbolic name, URL pattern and its methods.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub name: String,
    /// URL pattern with `{var}` placeholders, e.g. `/users/{id}`.
    pub pattern: String,
    pub methods: Vec<RouteMethod>,
    /// Permissions declared by a service layer, keyed by upper-cased method.
    pub service_permissions: BTreeMap<String, String>,
    /// Service-layer permission applying to every method of the route.
    pub default_permission: Option<String>,
}

impl RouteDescriptor {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            methods: Vec::new(),
            service_permissions: BTreeMap::new(),
            default_permission: None,
        }
    }

    pub fn method(mut self, method: RouteMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Service-layer permission for a single method.
    pub fn service_permission(
        mut self,
        method: impl AsRef<str>,
        permission: impl Into<String>,
    ) -> Self {
        self.service_permissions.insert(
            method.as_ref().trim().to_ascii_uppercase(),
            permission.into(),
        );
        self
    }

    /// Service-layer permission for the whole route.
    pub fn default_permission(mut self, permission: impl Into<String>) -> Self {
        self.default_permission = Some(permission.into());
        self
    }

    /// Find the metadata for a method, case-insensitively.
    pub fn find_method(&self, method: &str) -> Option<&RouteMethod> {
        self.methods
            .iter()
            .find(|m| m.method.trim().eq_ignore_ascii_case(method.trim()))
    }

    /// Effective permission for a method.
    ///
    /// A permission declared directly on the method wins, then a service
    /// permission for that specific method, then the route-level default.
    pub fn effective_permission(&self, method: &str) -> Option<&str> {
        let upper = method.trim().to_ascii_uppercase();
        self.find_method(&upper)
            .and_then(|m| m.permission.as_deref())
            .or_else(|| self.service_permissions.get(&upper).map(String::as_str))
            .or(self.default_permission.as_deref())
    }
}

/// Mutable route catalog used while the host is being configured.
#[derive(Debug, Default)]
pub struct RouteCatalog {
    routes: Vec<RouteDescriptor>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Registration order is preserved.
    pub fn add_route(&mut self, route: RouteDescriptor) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finish configuration and freeze the catalog.
    pub fn commit(self) -> CommittedRoutes {
        CommittedRoutes {
            routes: self.routes.into(),
        }
    }
}

/// Immutable, cheaply cloneable snapshot of a committed catalog.
#[derive(Debug, Clone)]
pub struct CommittedRoutes {
    routes: Arc<[RouteDescriptor]>,
}

impl CommittedRoutes {
    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Find the route registered under an exact URL pattern.
    pub fn by_pattern(&self, pattern: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.pattern == pattern)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
