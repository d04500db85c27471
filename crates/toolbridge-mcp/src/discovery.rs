//! Route-to-tool discovery.
//!
//! Walks a committed host route catalog and generates one tool per route
//! and HTTP method:
//!
//! | Method | Pattern | Tool name |
//! |--------|---------|-----------|
//! | GET | collection (`/users`) | `list_<route>` |
//! | GET | item (`/users/{id}`) | `get_<singular route>` |
//! | POST | any | `create_<singular route>` |
//! | PUT | any | `update_<singular route>` |
//! | PATCH | any | `patch_<singular route>` |
//! | DELETE | any | `delete_<singular route>` |
//! | other | any | `<method>_<route>` |
//!
//! OPTIONS and HEAD never become tools. Routes that cannot be turned into a
//! tool are logged and skipped; discovery never fails as a whole.

use crate::schema::{self, PatternError};
use crate::security::SecurityTranslator;
use crate::tools::{RegistryError, RouteBinding, Tool, ToolHandler, ToolParts};
use axum::http::Method;
use std::collections::HashSet;
use toolbridge_core::{
    CommittedRoutes, DiscoveryConfig, HandlerParam, RouteDescriptor, RouteMethod, SecurityScheme,
    ValidationSchema,
};

/// Methods that are never exposed as tools.
const EXCLUDED_METHODS: [&str; 2] = ["OPTIONS", "HEAD"];

/// Route metadata for one route × method pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub route_name: String,
    pub url_pattern: String,
    /// Upper-cased method token.
    pub http_method: String,
    pub params: Vec<HandlerParam>,
    pub permission: Option<String>,
    pub validation: Option<ValidationSchema>,
    pub description: Option<String>,
    pub security: Option<SecurityScheme>,
    pub llm_context_hint: Option<String>,
}

impl RouteInfo {
    fn new(route: &RouteDescriptor, method: &RouteMethod) -> Self {
        let http_method = method.method_upper();
        Self {
            route_name: route.name.clone(),
            url_pattern: route.pattern.clone(),
            permission: route.effective_permission(&http_method).map(str::to_string),
            http_method,
            params: method.params.clone(),
            validation: method.validation.clone(),
            description: method.description.clone(),
            security: method.security,
            llm_context_hint: method.llm_context_hint.clone(),
        }
    }
}

/// Include/exclude pattern.
///
/// Supports an exact match, `*`, `prefix/*` (which also matches `prefix`)
/// and `prefix*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern(String);

impl RoutePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Match a single candidate string.
    pub fn matches(&self, candidate: &str) -> bool {
        let pattern = self.0.as_str();
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            return candidate == prefix
                || candidate
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'));
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return candidate.starts_with(prefix);
        }
        candidate == pattern
    }

    /// Match against the route name and URL pattern, with and without the
    /// leading slash.
    pub fn matches_route(&self, info: &RouteInfo) -> bool {
        let bare = info.url_pattern.trim_start_matches('/');
        [info.route_name.as_str(), info.url_pattern.as_str(), bare]
            .iter()
            .any(|candidate| self.matches(candidate))
            || self
                .0
                .strip_prefix('/')
                .is_some_and(|p| RoutePattern::new(p).matches(bare))
    }
}

/// Why a route could not become a tool.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("route has an empty name")]
    EmptyName,

    #[error("invalid HTTP method token '{0}'")]
    InvalidMethod(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Outcome of a discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub tools: Vec<Tool>,
    pub skipped_malformed: usize,
    pub skipped_duplicates: usize,
    pub filtered: usize,
    /// OPTIONS/HEAD methods ignored.
    pub excluded_methods: usize,
}

/// Generates route-backed tools from a committed catalog.
#[derive(Debug, Clone)]
pub struct RouteDiscoverer {
    enabled: bool,
    include: Vec<RoutePattern>,
    exclude: Vec<RoutePattern>,
    translator: SecurityTranslator,
}

impl RouteDiscoverer {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            enabled: config.enabled,
            include: config.include.iter().map(RoutePattern::new).collect(),
            exclude: config.exclude.iter().map(RoutePattern::new).collect(),
            translator: SecurityTranslator::new(config.expose_auth_as_params),
        }
    }

    /// Whether a route passes the include/exclude filters.
    pub fn is_included(&self, info: &RouteInfo) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches_route(info));
        included && !self.exclude.iter().any(|p| p.matches_route(info))
    }

    /// Route infos for every exposable route × method, in catalog order.
    pub fn route_infos(&self, routes: &CommittedRoutes) -> Vec<RouteInfo> {
        routes
            .iter()
            .flat_map(|route| {
                route
                    .methods
                    .iter()
                    .filter(|m| !is_excluded_method(&m.method))
                    .map(move |m| RouteInfo::new(route, m))
            })
            .collect()
    }

    pub fn discover(&self, routes: &CommittedRoutes) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        if !self.enabled {
            tracing::info!("Route discovery disabled");
            return report;
        }

        let mut seen = HashSet::new();
        for route in routes.iter() {
            for method in &route.methods {
                if is_excluded_method(&method.method) {
                    report.excluded_methods += 1;
                    continue;
                }

                let info = RouteInfo::new(route, method);
                if !self.is_included(&info) {
                    tracing::debug!(
                        route = %info.route_name,
                        method = %info.http_method,
                        "Route filtered out"
                    );
                    report.filtered += 1;
                    continue;
                }

                let tool = match self.build_tool(&info) {
                    Ok(tool) => tool,
                    Err(error) => {
                        tracing::warn!(
                            route = %info.route_name,
                            pattern = %info.url_pattern,
                            method = %info.http_method,
                            %error,
                            "Skipping malformed route"
                        );
                        report.skipped_malformed += 1;
                        continue;
                    }
                };

                if !seen.insert(tool.name.clone()) {
                    tracing::warn!(
                        tool = %tool.name,
                        route = %info.route_name,
                        "Skipping route with duplicate tool name"
                    );
                    report.skipped_duplicates += 1;
                    continue;
                }
                report.tools.push(tool);
            }
        }

        tracing::info!(
            tools = report.tools.len(),
            filtered = report.filtered,
            malformed = report.skipped_malformed,
            duplicates = report.skipped_duplicates,
            "Route discovery complete"
        );
        report
    }

    /// Turn one route × method into a tool.
    pub fn build_tool(&self, info: &RouteInfo) -> Result<Tool, DiscoveryError> {
        if info.route_name.trim().is_empty() {
            return Err(DiscoveryError::EmptyName);
        }
        if info.http_method.is_empty() || Method::from_bytes(info.http_method.as_bytes()).is_err()
        {
            return Err(DiscoveryError::InvalidMethod(info.http_method.clone()));
        }

        let generated = schema::generate(
            &info.http_method,
            &info.url_pattern,
            &info.params,
            info.validation.as_ref(),
        )?;
        if !generated.conflicts.is_empty() {
            tracing::debug!(
                route = %info.route_name,
                conflicts = ?generated.conflicts,
                "Field names shared between path and request data"
            );
        }

        let name = tool_name(&info.http_method, &info.route_name, &info.url_pattern);
        let description = info
            .description
            .clone()
            .unwrap_or_else(|| format!("{} handler for {}", info.http_method, info.url_pattern));

        let tool = Tool::assemble(
            ToolParts {
                name,
                description,
                schema: generated.input_schema,
                params: generated.params,
                handler: ToolHandler::Route(RouteBinding {
                    route_name: info.route_name.clone(),
                    method: info.http_method.clone(),
                    pattern: info.url_pattern.clone(),
                }),
                permission: info.permission.clone(),
                security: info.security,
                llm_context_hint: info.llm_context_hint.clone(),
            },
            &self.translator,
        )?;
        Ok(tool)
    }
}

fn is_excluded_method(method: &str) -> bool {
    EXCLUDED_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method.trim()))
}

/// Deterministic tool name for a route method.
pub fn tool_name(method: &str, route_name: &str, pattern: &str) -> String {
    let mut base = snake_case(route_name);
    if base.is_empty() {
        base = pattern_base(pattern);
    }

    let method = method.trim().to_ascii_uppercase();
    match method.as_str() {
        "GET" if ends_with_variable(pattern) => format!("get_{}", singular_base(&base)),
        "GET" => format!("list_{base}"),
        "POST" => format!("create_{}", singular_base(&base)),
        "PUT" => format!("update_{}", singular_base(&base)),
        "PATCH" => format!("patch_{}", singular_base(&base)),
        "DELETE" => format!("delete_{}", singular_base(&base)),
        other => format!("{}_{base}", snake_case(other)),
    }
}

fn ends_with_variable(pattern: &str) -> bool {
    pattern
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .is_some_and(|segment| segment.starts_with('{') && segment.ends_with('}'))
}

/// Base from the static segments of a pattern.
fn pattern_base(pattern: &str) -> String {
    let joined = pattern
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect::<Vec<_>>()
        .join("_");
    let base = snake_case(&joined);
    if base.is_empty() {
        "root".to_string()
    } else {
        base
    }
}

/// Convert an identifier such as `UserDetail` or `user-detail` to snake_case.
fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_lowercase());
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Singularize the last word of a snake_case base.
fn singular_base(base: &str) -> String {
    match base.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", singularize(last)),
        None => singularize(base),
    }
}

/// Simple singularization (converts plural to singular).
fn singularize(s: &str) -> String {
    // Common irregular plurals
    let irregulars = [
        ("people", "person"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("teeth", "tooth"),
        ("feet", "foot"),
    ];

    for (plural, singular) in irregulars {
        if s == plural {
            return singular.to_string();
        }
    }

    if s.ends_with("ies") && s.len() > 3 {
        return format!("{}y", &s[..s.len() - 3]);
    }

    // "statuses", "campuses"; but "houses", "causes" take the plain -s rule
    if s.ends_with("uses") && !s.ends_with("ouses") && !s.ends_with("auses") {
        return s[..s.len() - 2].to_string();
    }

    if s.ends_with("xes") || s.ends_with("ches") || s.ends_with("shes") || s.ends_with("sses") {
        return s[..s.len() - 2].to_string();
    }

    if s.ends_with("ves") {
        return format!("{}f", &s[..s.len() - 3]);
    }

    // Not "status", "address" or "analysis"
    if s.ends_with('s') && !s.ends_with("ss") && !s.ends_with("us") && !s.ends_with("is") {
        return s[..s.len() - 1].to_string();
    }

    s.to_string()
}
