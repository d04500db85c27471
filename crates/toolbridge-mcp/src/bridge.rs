//! Tool execution through the host's own request pipeline.
//!
//! A route-backed tool call is translated into an internal HTTP request and
//! dispatched into the host application, so every host middleware
//! (authentication, permission checks, transactions) runs exactly as it
//! would for an external caller. Manual tools run their handler directly
//! after passing the same access gate.
//!
//! Within one call the order is fixed: credentials are validated, the
//! `Authorization` header is built, the remaining arguments are validated
//! against the tool's schema, and only then is anything dispatched.

use crate::access::{AccessDenied, AccessGate, ContextInput, SecurityContext};
use crate::error::ToolError;
use crate::protocol::{CallToolResponse, ToolContent};
use crate::schema::{self, ParamOrigin, QUERYSTRING_PARAM};
use crate::security::SecurityTranslator;
use crate::tools::{DirectHandler, RouteBinding, Tool, ToolHandler, ToolInvocation};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceExt;

/// Default cap on host response bodies read back into a tool result.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Something that can serve an internal request like an external one.
#[async_trait]
pub trait HostDispatch: Send + Sync {
    async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError>;
}

#[async_trait]
impl HostDispatch for Router {
    async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError> {
        self.clone()
            .oneshot(request)
            .await
            .map_err(|never: Infallible| match never {})
    }
}

/// Headers and request extensions of the inbound protocol request.
///
/// Extensions are cloned into every sub-request, so per-request host state
/// (a database transaction handle, a request id) is shared with the call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub headers: HeaderMap,
    pub extensions: Extensions,
}

impl CallContext {
    pub fn new(headers: HeaderMap, extensions: Extensions) -> Self {
        Self {
            headers,
            extensions,
        }
    }

    /// Context from an inbound request's parts.
    ///
    /// Routing extensions added by axum for the MCP endpoint itself are
    /// dropped so they cannot leak into sub-request routing.
    pub fn from_parts(parts: &Parts) -> Self {
        let mut extensions = parts.extensions.clone();
        extensions.remove::<axum::extract::MatchedPath>();
        extensions.remove::<axum::extract::OriginalUri>();
        Self::new(parts.headers.clone(), extensions)
    }

    pub fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }
}

/// Extension marking a sub-request as originating from a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallOrigin {
    pub tool: String,
}

/// Executes tools against the host application.
pub struct RequestBridge {
    host: Arc<dyn HostDispatch>,
    gate: Option<AccessGate>,
    translator: SecurityTranslator,
    mount_path: String,
    body_limit: usize,
}

impl std::fmt::Debug for RequestBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBridge")
            .field("gate", &self.gate)
            .field("translator", &self.translator)
            .field("mount_path", &self.mount_path)
            .finish_non_exhaustive()
    }
}

impl RequestBridge {
    pub fn new(host: impl HostDispatch + 'static, translator: SecurityTranslator) -> Self {
        Self {
            host: Arc::new(host),
            gate: None,
            translator,
            mount_path: "/mcp".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Gate used for manual tools; should be the one layered on the host.
    pub fn with_gate(mut self, gate: AccessGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub async fn execute(
        &self,
        tool: &Tool,
        arguments: Value,
        context: &CallContext,
    ) -> Result<CallToolResponse, ToolError> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(args) => args,
            _ => {
                return Err(ToolError::invalid_arguments(
                    &tool.name,
                    "arguments must be a JSON object",
                ));
            }
        };

        self.translator
            .validate(&args, tool.security, &context.headers)?;
        let (auth_headers, mut args) =
            self.translator
                .extract_headers(args, tool.security, &context.headers)?;
        let mut call_context = context.clone();
        call_context.headers.extend(auth_headers);

        // Route calls never forward the wrapper itself, whatever the method.
        let querystring = match &tool.handler {
            ToolHandler::Route(_)
                if !tool
                    .param(QUERYSTRING_PARAM)
                    .is_some_and(|p| p.origin != ParamOrigin::Query) =>
            {
                args.remove(QUERYSTRING_PARAM)
            }
            _ => None,
        };
        for param in &tool.params {
            if matches!(param.origin, ParamOrigin::Query | ParamOrigin::Body)
                && !args.contains_key(&param.name)
            {
                if let Some(default) = &param.default {
                    args.insert(param.name.clone(), default.clone());
                }
            }
        }
        tool.validate_arguments(&args)?;

        let mut response = match &tool.handler {
            ToolHandler::Route(binding) => {
                let request = build_request(tool, binding, args, querystring, &call_context)?;
                tracing::debug!(
                    tool = %tool.name,
                    method = %request.method(),
                    uri = %request.uri(),
                    "Dispatching tool call to host"
                );
                self.dispatch(tool, request).await?
            }
            ToolHandler::Direct(handler) => {
                self.run_direct(tool, handler, args, call_context).await?
            }
        };

        if let Some(hint) = &tool.llm_context_hint {
            response.meta = Some(json!({ "llmContextHint": hint }));
        }
        Ok(response)
    }

    async fn dispatch(
        &self,
        tool: &Tool,
        request: Request<Body>,
    ) -> Result<CallToolResponse, ToolError> {
        let response = self
            .host
            .dispatch(request)
            .await
            .map_err(|e| ToolError::Dispatch(e.to_string()))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json") || ct.contains("+json"));
        let bytes = axum::body::to_bytes(response.into_body(), self.body_limit)
            .await
            .map_err(|e| ToolError::Dispatch(format!("failed to read host response: {e}")))?;

        let body = if is_json {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        } else {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        };

        if status.is_success() {
            tracing::info!(tool = %tool.name, status = status.as_u16(), "Tool call completed");
            let content = match body {
                Value::String(text) => ToolContent::Text { text },
                json => ToolContent::Json { json },
            };
            return Ok(CallToolResponse::new(vec![content]));
        }

        tracing::info!(tool = %tool.name, status = status.as_u16(), "Host rejected tool call");
        Err(status_error(tool, status, body))
    }

    async fn run_direct(
        &self,
        tool: &Tool,
        handler: &DirectHandler,
        arguments: Map<String, Value>,
        context: CallContext,
    ) -> Result<CallToolResponse, ToolError> {
        let security = self.authorize_direct(tool, &context)?;

        let value = handler(ToolInvocation {
            tool: tool.name.clone(),
            arguments,
            context,
            security,
        })
        .await?;

        tracing::info!(tool = %tool.name, "Tool call completed");
        let content = match value {
            Value::String(text) => ToolContent::Text { text },
            json => ToolContent::Json { json },
        };
        Ok(CallToolResponse::new(vec![content]))
    }

    /// Check a manual tool's permission with a synthetic request.
    fn authorize_direct(
        &self,
        tool: &Tool,
        context: &CallContext,
    ) -> Result<Option<SecurityContext>, ToolError> {
        let Some(gate) = &self.gate else {
            if let Some(permission) = &tool.permission {
                tracing::warn!(
                    tool = %tool.name,
                    permission = %permission,
                    "No access gate configured; denying protected tool"
                );
                return Err(ToolError::AccessDenied {
                    tool: tool.name.clone(),
                    denial: AccessDenied::Unauthenticated {
                        permission: permission.clone(),
                    },
                });
            }
            return Ok(None);
        };

        let uri: Uri = format!(
            "{}/tools/{}",
            self.mount_path.trim_end_matches('/'),
            urlencoding::encode(&tool.name)
        )
        .parse()
        .map_err(|e| ToolError::Dispatch(format!("invalid synthetic URI: {e}")))?;

        let input = ContextInput {
            route_name: Some(&tool.name),
            method: Method::POST.as_str(),
            uri: &uri,
            headers: &context.headers,
            extensions: &context.extensions,
        };
        gate.check(&input, tool.permission.as_deref())
            .map(Some)
            .map_err(|denial| ToolError::AccessDenied {
                tool: tool.name.clone(),
                denial,
            })
    }
}

fn status_error(tool: &Tool, status: StatusCode, body: Value) -> ToolError {
    let permission = body
        .get("permission")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| tool.permission.clone())
        .unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED => ToolError::AccessDenied {
            tool: tool.name.clone(),
            denial: AccessDenied::Unauthenticated { permission },
        },
        StatusCode::FORBIDDEN => ToolError::AccessDenied {
            tool: tool.name.clone(),
            denial: AccessDenied::Forbidden {
                permission,
                principal: None,
            },
        },
        _ => ToolError::UpstreamStatus {
            status: status.as_u16(),
            body,
        },
    }
}

/// Translate a route-backed call into an HTTP request.
fn build_request(
    tool: &Tool,
    binding: &RouteBinding,
    args: Map<String, Value>,
    querystring: Option<Value>,
    context: &CallContext,
) -> Result<Request<Body>, ToolError> {
    let takes_body = schema::takes_body(&binding.method);
    let mut path_values = Map::new();
    let mut query: Vec<(String, String)> = Vec::new();
    let mut body = Map::new();

    for (name, value) in args {
        let mut origins = tool
            .params
            .iter()
            .filter(|p| p.name == name && p.origin != ParamOrigin::Auth)
            .map(|p| p.origin)
            .peekable();

        if origins.peek().is_none() {
            if takes_body {
                body.insert(name, value);
            } else {
                push_query(&mut query, &name, &value);
            }
            continue;
        }

        for origin in origins {
            match origin {
                ParamOrigin::Path => {
                    path_values.insert(name.clone(), value.clone());
                }
                ParamOrigin::Query => push_query(&mut query, &name, &value),
                ParamOrigin::Body => {
                    body.insert(name.clone(), value.clone());
                }
                ParamOrigin::Auth => {}
            }
        }
    }

    if let Some(extra) = querystring {
        let explicit: Vec<String> = query.iter().map(|(k, _)| k.clone()).collect();
        for (key, value) in querystring_pairs(&tool.name, extra)? {
            if !explicit.contains(&key) {
                query.push((key, value));
            }
        }
    }

    let mut uri = render_path(&tool.name, &binding.pattern, &path_values)?;
    if !query.is_empty() {
        uri.push('?');
        uri.push_str(&encode_query(&query));
    }

    let method = Method::from_bytes(binding.method.as_bytes())
        .map_err(|e| ToolError::Dispatch(format!("invalid method {}: {e}", binding.method)))?;

    let mut headers = context.headers.clone();
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_TYPE);
    headers.remove(HOST);

    let body = if takes_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bytes = serde_json::to_vec(&Value::Object(body))
            .map_err(|e| ToolError::Dispatch(format!("failed to encode body: {e}")))?;
        Body::from(bytes)
    } else {
        Body::empty()
    };

    let mut request = Request::builder()
        .method(method)
        .uri(&uri)
        .body(body)
        .map_err(|e| ToolError::Dispatch(format!("invalid request for {uri}: {e}")))?;
    *request.headers_mut() = headers;
    *request.extensions_mut() = context.extensions.clone();
    request.extensions_mut().insert(ToolCallOrigin {
        tool: tool.name.clone(),
    });
    Ok(request)
}

/// Scalar text for a path or query value.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_query(query: &mut Vec<(String, String)>, name: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items.iter().filter(|v| !v.is_null()) {
                query.push((name.to_string(), scalar_text(item)));
            }
        }
        other => query.push((name.to_string(), scalar_text(other))),
    }
}

/// Pairs from a `querystring` argument: an object or `a=1&b=2` text.
fn querystring_pairs(tool: &str, value: Value) -> Result<Vec<(String, String)>, ToolError> {
    let mut pairs = Vec::new();
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in &map {
                push_query(&mut pairs, key, value);
            }
        }
        Value::String(text) => {
            for part in text.trim_start_matches('?').split('&').filter(|p| !p.is_empty()) {
                let (key, value) = part.split_once('=').unwrap_or((part, ""));
                let decode = |s: &str| {
                    urlencoding::decode(&s.replace('+', " "))
                        .map(|d| d.into_owned())
                        .map_err(|_| {
                            invalid_field(tool, QUERYSTRING_PARAM, "querystring is not valid UTF-8")
                        })
                };
                pairs.push((decode(key)?, decode(value)?));
            }
        }
        _ => {
            return Err(invalid_field(
                tool,
                QUERYSTRING_PARAM,
                "querystring must be an object or a string",
            ));
        }
    }
    Ok(pairs)
}

fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Substitute path variables, percent-encoding each value.
fn render_path(
    tool: &str,
    pattern: &str,
    values: &Map<String, Value>,
) -> Result<String, ToolError> {
    let variables =
        schema::path_variables(pattern).map_err(|e| ToolError::Dispatch(e.to_string()))?;

    let mut path = pattern.to_string();
    for var in variables {
        let value = values
            .get(&var.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                invalid_field(tool, &var.name, &format!("missing path parameter '{}'", var.name))
            })?;
        let text = scalar_text(value);
        let encoded = if var.catch_all {
            text.split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        } else {
            urlencoding::encode(&text).into_owned()
        };
        let token = if var.catch_all {
            format!("{{*{}}}", var.name)
        } else {
            format!("{{{}}}", var.name)
        };
        path = path.replacen(&token, &encoded, 1);
    }
    Ok(path)
}

fn invalid_field(tool: &str, field: &str, reason: &str) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.to_string(),
        field: Some(field.to_string()),
    }
}
