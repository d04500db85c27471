//! Tool registry for MCP tools.
//!
//! Manual tools are staged on a [`RegistryBuilder`]; discovered tools are
//! produced by [`crate::discovery`]. Both are merged exactly once by
//! [`RegistryBuilder::seal`], after which the [`ToolRegistry`] is immutable
//! and shared behind an `Arc`.

use crate::access::SecurityContext;
use crate::bridge::CallContext;
use crate::error::ToolError;
use crate::protocol::{ToolAnnotations, ToolDefinition};
use crate::schema::{JsonType, ParamOrigin, ParameterSpec};
use crate::security::{SecurityTranslator, auth_specs};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use toolbridge_core::SecurityScheme;

/// Arguments and context handed to a manual tool handler.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub context: CallContext,
    /// Resolved by the access gate when one is configured.
    pub security: Option<SecurityContext>,
}

pub type DirectHandler =
    Arc<dyn Fn(ToolInvocation) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Host route a discovered tool dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub route_name: String,
    /// Upper-cased HTTP method.
    pub method: String,
    pub pattern: String,
}

/// How a tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    Direct(DirectHandler),
    Route(RouteBinding),
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandler::Direct(_) => f.write_str("Direct(..)"),
            ToolHandler::Route(binding) => f.debug_tuple("Route").field(binding).finish(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("tool {name} is registered more than once")]
    DuplicateTool { name: String },

    #[error("tool {name} has no handler")]
    MissingHandler { name: String },

    #[error("tool {name} has an invalid input schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

/// Everything needed to assemble a [`Tool`].
pub(crate) struct ToolParts {
    pub name: String,
    pub description: String,
    /// Schema without credential properties; used for validation.
    pub schema: Value,
    pub params: Vec<ParameterSpec>,
    pub handler: ToolHandler,
    pub permission: Option<String>,
    pub security: Option<SecurityScheme>,
    pub llm_context_hint: Option<String>,
}

/// A callable tool.
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Advertised schema, credential properties included.
    pub input_schema: Value,
    pub handler: ToolHandler,
    pub permission: Option<String>,
    pub security: Option<SecurityScheme>,
    pub llm_context_hint: Option<String>,
    pub params: Vec<ParameterSpec>,
    required: Vec<String>,
    validator: jsonschema::Validator,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("handler", &self.handler)
            .field("permission", &self.permission)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl Tool {
    pub(crate) fn assemble(
        parts: ToolParts,
        translator: &SecurityTranslator,
    ) -> Result<Self, RegistryError> {
        let ToolParts {
            name,
            description,
            schema,
            mut params,
            handler,
            permission,
            security,
            llm_context_hint,
        } = parts;

        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !schema.is_object() {
            return Err(RegistryError::InvalidSchema {
                name,
                reason: "schema must be a JSON object".to_string(),
            });
        }
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| RegistryError::InvalidSchema {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let required = schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        if let Some(scheme) = security {
            params.extend(auth_specs(scheme));
        }
        let input_schema = translator.merge_schema(&schema, security);

        Ok(Self {
            name,
            description,
            input_schema,
            handler,
            permission,
            security,
            llm_context_hint,
            params,
            required,
            validator,
        })
    }

    /// Host route binding for discovered tools.
    pub fn route(&self) -> Option<&RouteBinding> {
        match &self.handler {
            ToolHandler::Route(binding) => Some(binding),
            ToolHandler::Direct(_) => None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params
            .iter()
            .find(|p| p.name == name && p.origin != ParamOrigin::Auth)
    }

    /// Entry for `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        let method = self.route().map(|r| r.method.as_str());
        let annotations = ToolAnnotations {
            read_only: (method == Some("GET")).then_some(true),
            destructive: (method == Some("DELETE")).then_some(true),
            llm_context_hint: self.llm_context_hint.clone(),
        };

        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
            annotations: (!annotations.is_empty()).then_some(annotations),
        }
    }

    /// Validate credential-free arguments against the input schema.
    pub fn validate_arguments(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        if let Some(missing) = self.required.iter().find(|name| !args.contains_key(*name)) {
            return Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason: format!("missing required argument '{missing}'"),
                field: Some(missing.clone()),
            });
        }

        let instance = Value::Object(args.clone());
        if let Some(error) = self.validator.iter_errors(&instance).next() {
            let path = error.instance_path().to_string();
            let field = path
                .trim_start_matches('/')
                .split('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string);
            return Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason: error.to_string(),
                field,
            });
        }
        Ok(())
    }
}

/// Builder for a manually declared tool.
pub struct ManualTool {
    name: String,
    description: Option<String>,
    schema: Value,
    permission: Option<String>,
    security: Option<SecurityScheme>,
    context_hint: Option<String>,
    handler: Option<DirectHandler>,
}

impl ManualTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema: json!({ "type": "object", "properties": {} }),
            permission: None,
            security: None,
            context_hint: None,
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn security(mut self, scheme: SecurityScheme) -> Self {
        self.security = Some(scheme);
        self
    }

    pub fn context_hint(mut self, hint: impl Into<String>) -> Self {
        self.context_hint = Some(hint.into());
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ToolInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: DirectHandler = Arc::new(move |invocation| handler(invocation).boxed());
        self.handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn into_tool(self, translator: &SecurityTranslator) -> Result<Tool, RegistryError> {
        let handler = self.handler.ok_or_else(|| RegistryError::MissingHandler {
            name: self.name.clone(),
        })?;
        let params = schema_params(&self.schema);
        let description = self
            .description
            .unwrap_or_else(|| format!("Tool {}", self.name));

        Tool::assemble(
            ToolParts {
                name: self.name,
                description,
                schema: self.schema,
                params,
                handler: ToolHandler::Direct(handler),
                permission: self.permission,
                security: self.security,
                llm_context_hint: self.context_hint,
            },
            translator,
        )
    }
}

/// Parameter specs for a hand-written schema; every property is body data.
fn schema_params(schema: &Value) -> Vec<ParameterSpec> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema["properties"]
        .as_object()
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    let json_type = match prop["type"].as_str() {
                        Some("string") => JsonType::String,
                        Some("integer") => JsonType::Integer,
                        Some("number") => JsonType::Number,
                        Some("boolean") => JsonType::Boolean,
                        Some("array") => JsonType::Array,
                        Some("object") => JsonType::Object,
                        _ => JsonType::Any,
                    };
                    ParameterSpec::new(name, json_type, ParamOrigin::Body)
                        .required(required.contains(&name.as_str()))
                        .with_default(prop.get("default").cloned())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Manual registrations awaiting [`RegistryBuilder::seal`].
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<ManualTool>,
    translator: SecurityTranslator,
}

impl RegistryBuilder {
    pub fn new(translator: SecurityTranslator) -> Self {
        Self {
            pending: Vec::new(),
            translator,
        }
    }

    pub fn register(&mut self, tool: ManualTool) -> &mut Self {
        self.pending.push(tool);
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Merge manual and discovered tools into the final registry.
    ///
    /// Manual tools come first and win name collisions; a discovered tool
    /// whose name is taken is dropped and counted in
    /// [`ToolRegistry::shadowed`].
    pub fn seal(self, discovered: Vec<Tool>) -> Result<ToolRegistry, RegistryError> {
        let mut registry = ToolRegistry::default();

        for manual in self.pending {
            if registry.contains(manual.name()) {
                return Err(RegistryError::DuplicateTool {
                    name: manual.name,
                });
            }
            let tool = manual.into_tool(&self.translator)?;
            registry.push(tool);
        }

        for tool in discovered {
            if registry.contains(&tool.name) {
                tracing::warn!(tool = %tool.name, "Discovered tool shadowed by an existing tool");
                registry.shadowed += 1;
                continue;
            }
            registry.push(tool);
        }

        tracing::info!(
            tools = registry.len(),
            shadowed = registry.shadowed,
            "Tool registry sealed"
        );
        Ok(registry)
    }
}

/// Immutable set of tools in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
    index: HashMap<String, usize>,
    shadowed: usize,
}

impl ToolRegistry {
    fn push(&mut self, tool: Tool) {
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(Arc::new(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.tools.iter()
    }

    /// Definitions for `tools/list`, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Discovered tools dropped because their name was already taken.
    pub fn shadowed(&self) -> usize {
        self.shadowed
    }
}
