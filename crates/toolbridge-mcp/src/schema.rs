//! Input schema generation for route-backed tools.
//!
//! Given a route's URL pattern, its handler parameter hints and an optional
//! validation schema, this module produces the JSON Schema published in
//! `tools/list` together with one [`ParameterSpec`] per argument, tagged
//! with where the argument travels in the HTTP request.
//!
//! ## Origin rules
//!
//! | Source | Origin |
//! |--------|--------|
//! | `{var}` in the URL pattern | path (always required) |
//! | validation field, GET/DELETE | query |
//! | validation field, POST/PUT/PATCH | body |
//! | `querystring` (GET/DELETE only) | query, keys merged at call time |
//!
//! Everything here is pure: no I/O, no logging side effects beyond debug
//! traces for hints that fall back to the permissive schema.

use serde::Serialize;
use serde_json::{json, Map, Value};
use toolbridge_core::{FieldKind, FieldSchema, HandlerParam, ValidationSchema};

/// Reserved argument whose keys are merged into the query string.
pub const QUERYSTRING_PARAM: &str = "querystring";

/// Where an argument is placed when the tool call becomes an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamOrigin {
    Path,
    Query,
    Body,
    /// Credential injected by the security translator; never forwarded as data.
    Auth,
}

/// Coarse JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl JsonType {
    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Any => "any",
        }
    }
}

/// A named tool argument and where it goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub json_type: JsonType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub origin: ParamOrigin,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, json_type: JsonType, origin: ParamOrigin) -> Self {
        Self {
            name: name.into(),
            json_type,
            required: false,
            default: None,
            origin,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSchema {
    pub input_schema: Value,
    pub params: Vec<ParameterSpec>,
    /// Names declared both as a path variable and as a query/body field.
    pub conflicts: Vec<String>,
}

/// Errors in a route's URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern '{pattern}' must start with '/'")]
    NotAbsolute { pattern: String },

    #[error("pattern '{pattern}' has unbalanced braces")]
    Unbalanced { pattern: String },

    #[error("pattern '{pattern}' has an empty path variable")]
    EmptyVariable { pattern: String },

    #[error("pattern '{pattern}' has invalid path variable '{name}'")]
    InvalidVariable { pattern: String, name: String },

    #[error("pattern '{pattern}' repeats path variable '{name}'")]
    DuplicateVariable { pattern: String, name: String },
}

/// A path variable in a URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathVariable {
    pub name: String,
    /// `{*name}` captures the remainder of the path, slashes included.
    pub catch_all: bool,
}

/// Extract `{var}` / `{*var}` tokens from a URL pattern, in order.
pub fn path_variables(pattern: &str) -> Result<Vec<PathVariable>, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::NotAbsolute {
            pattern: pattern.to_string(),
        });
    }

    let mut vars: Vec<PathVariable> = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(PatternError::Unbalanced {
                pattern: pattern.to_string(),
            });
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| PatternError::Unbalanced {
            pattern: pattern.to_string(),
        })?;
        let token = &after[..close];
        if token.contains('{') {
            return Err(PatternError::Unbalanced {
                pattern: pattern.to_string(),
            });
        }

        let (name, catch_all) = match token.strip_prefix('*') {
            Some(name) => (name, true),
            None => (token, false),
        };
        if name.is_empty() {
            return Err(PatternError::EmptyVariable {
                pattern: pattern.to_string(),
            });
        }
        if !is_identifier(name) {
            return Err(PatternError::InvalidVariable {
                pattern: pattern.to_string(),
                name: name.to_string(),
            });
        }
        if vars.iter().any(|v| v.name == name) {
            return Err(PatternError::DuplicateVariable {
                pattern: pattern.to_string(),
                name: name.to_string(),
            });
        }

        vars.push(PathVariable {
            name: name.to_string(),
            catch_all,
        });
        rest = &after[close + 1..];
    }

    Ok(vars)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether a method carries its fields in a JSON body.
pub fn takes_body(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH"
    )
}

/// Whether a method's tool accepts the reserved `querystring` argument.
pub fn accepts_querystring(method: &str) -> bool {
    matches!(method.to_ascii_uppercase().as_str(), "GET" | "DELETE")
}

/// Result of interpreting a textual type hint.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub schema: Value,
    pub json_type: JsonType,
    /// `Option<T>` / `Optional[T]` wrappers were present.
    pub optional: bool,
}

impl TypeInfo {
    fn any() -> Self {
        Self {
            schema: json!({}),
            json_type: JsonType::Any,
            optional: false,
        }
    }

    fn simple(json_type: JsonType) -> Self {
        Self {
            schema: json!({ "type": json_type.as_str() }),
            json_type,
            optional: false,
        }
    }
}

/// Interpret a type hint such as `"int"`, `"Option<u64>"` or `"list[str]"`.
///
/// Unknown or malformed hints yield the permissive `{}` schema.
pub fn parse_type_hint(hint: &str) -> TypeInfo {
    if !balanced(hint) {
        tracing::debug!(hint, "Malformed type hint, treating as any");
        return TypeInfo::any();
    }
    parse_hint(hint.trim(), 0).unwrap_or_else(|| {
        tracing::debug!(hint, "Unrecognised type hint, treating as any");
        TypeInfo::any()
    })
}

fn parse_hint(hint: &str, depth: usize) -> Option<TypeInfo> {
    if depth > 8 || hint.is_empty() {
        return None;
    }

    if let Some((outer, inner)) = split_generic(hint) {
        let outer = base_name(outer);
        return match outer.as_str() {
            "option" | "optional" => {
                let mut info = parse_hint(inner, depth + 1)?;
                info.optional = true;
                Some(info)
            }
            "vec" | "list" | "set" | "hashset" | "btreeset" | "vecdeque" | "sequence" => {
                let items = parse_hint(inner, depth + 1).unwrap_or_else(TypeInfo::any);
                Some(TypeInfo {
                    schema: json!({ "type": "array", "items": items.schema }),
                    json_type: JsonType::Array,
                    optional: false,
                })
            }
            "hashmap" | "btreemap" | "dict" | "map" | "mapping" => Some(TypeInfo {
                schema: json!({ "type": "object", "additionalProperties": true }),
                json_type: JsonType::Object,
                optional: false,
            }),
            _ => None,
        };
    }

    if let Some(inner) = hint.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        let items = parse_hint(inner.trim(), depth + 1).unwrap_or_else(TypeInfo::any);
        return Some(TypeInfo {
            schema: json!({ "type": "array", "items": items.schema }),
            json_type: JsonType::Array,
            optional: false,
        });
    }

    let info = match base_name(hint).as_str() {
        "str" | "string" | "char" => TypeInfo::simple(JsonType::String),
        "uuid" => TypeInfo {
            schema: json!({ "type": "string", "format": "uuid" }),
            ..TypeInfo::simple(JsonType::String)
        },
        "datetime" => TypeInfo {
            schema: json!({ "type": "string", "format": "date-time" }),
            ..TypeInfo::simple(JsonType::String)
        },
        "date" | "naivedate" => TypeInfo {
            schema: json!({ "type": "string", "format": "date" }),
            ..TypeInfo::simple(JsonType::String)
        },
        "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16"
        | "u32" | "u64" | "u128" | "usize" => TypeInfo::simple(JsonType::Integer),
        "float" | "number" | "f32" | "f64" | "decimal" => TypeInfo::simple(JsonType::Number),
        "bool" | "boolean" => TypeInfo::simple(JsonType::Boolean),
        "dict" | "object" | "map" | "hashmap" | "btreemap" => TypeInfo {
            schema: json!({ "type": "object", "additionalProperties": true }),
            json_type: JsonType::Object,
            optional: false,
        },
        "list" | "array" | "vec" => TypeInfo {
            schema: json!({ "type": "array" }),
            json_type: JsonType::Array,
            optional: false,
        },
        _ => return None,
    };
    Some(info)
}

/// Split `Outer<Inner>` or `Outer[Inner]` at the outermost brackets.
fn split_generic(hint: &str) -> Option<(&str, &str)> {
    let open = hint.find(['<', '['])?;
    if open == 0 {
        return None;
    }
    let close = match hint.as_bytes()[open] {
        b'<' => '>',
        _ => ']',
    };
    let inner = hint[open + 1..].strip_suffix(close)?;
    Some((&hint[..open], inner.trim()))
}

/// Lower-cased final path segment, without references or lifetimes.
fn base_name(hint: &str) -> String {
    let hint = hint.trim().trim_start_matches('&');
    let hint = match hint.strip_prefix('\'') {
        Some(rest) => rest.split_once(' ').map(|(_, t)| t).unwrap_or(rest),
        None => hint,
    };
    let hint = hint.trim_start_matches("mut ").trim();
    hint.rsplit("::")
        .next()
        .unwrap_or(hint)
        .rsplit('.')
        .next()
        .unwrap_or(hint)
        .to_ascii_lowercase()
}

fn balanced(hint: &str) -> bool {
    let mut stack = Vec::new();
    for c in hint.chars() {
        match c {
            '<' | '[' => stack.push(c),
            '>' => {
                if stack.pop() != Some('<') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

/// JSON Schema for a field kind.
pub fn kind_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Integer => json!({ "type": "integer" }),
        FieldKind::Number => json!({ "type": "number" }),
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::List(inner) => json!({ "type": "array", "items": kind_schema(inner) }),
        FieldKind::Object(nested) => object_schema(nested),
        FieldKind::Map => json!({ "type": "object", "additionalProperties": true }),
        FieldKind::Any => json!({}),
    }
}

/// Coarse JSON type of a field kind.
pub fn kind_json_type(kind: &FieldKind) -> JsonType {
    match kind {
        FieldKind::String => JsonType::String,
        FieldKind::Integer => JsonType::Integer,
        FieldKind::Number => JsonType::Number,
        FieldKind::Boolean => JsonType::Boolean,
        FieldKind::List(_) => JsonType::Array,
        FieldKind::Object(_) | FieldKind::Map => JsonType::Object,
        FieldKind::Any => JsonType::Any,
    }
}

/// JSON Schema for one field, with its annotations.
pub fn field_schema(field: &FieldSchema) -> Value {
    let mut schema = kind_schema(&field.kind);
    if let Some(description) = &field.description {
        schema["description"] = json!(description);
    }
    if let Some(format) = &field.format {
        schema["format"] = json!(format);
    }
    if let Some(choices) = &field.choices {
        schema["enum"] = json!(choices);
    }
    if let Some(default) = &field.default {
        schema["default"] = default.clone();
    }
    schema
}

/// JSON Schema object for a whole validation schema.
pub fn object_schema(schema: &ValidationSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in &schema.fields {
        properties.insert(field.name.clone(), field_schema(field));
        if field.required {
            required.push(json!(field.name));
        }
    }
    object_value(properties, required)
}

fn object_value(properties: Map<String, Value>, required: Vec<Value>) -> Value {
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

/// Build the input schema and parameter specs for one route method.
pub fn generate(
    method: &str,
    pattern: &str,
    handler_params: &[HandlerParam],
    validation: Option<&ValidationSchema>,
) -> Result<GeneratedSchema, PatternError> {
    let path_vars = path_variables(pattern)?;
    let field_origin = if takes_body(method) {
        ParamOrigin::Body
    } else {
        ParamOrigin::Query
    };

    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let mut params = Vec::new();
    let mut conflicts = Vec::new();

    for var in &path_vars {
        let info = handler_params
            .iter()
            .find(|p| p.name == var.name)
            .map(|p| parse_type_hint(&p.type_hint))
            .unwrap_or_else(|| TypeInfo::simple(JsonType::String));

        let mut schema = info.schema;
        if schema.is_object() && schema.get("description").is_none() {
            schema["description"] = json!(format!("Path parameter '{}'", var.name));
        }
        properties.insert(var.name.clone(), schema);
        required.push(json!(var.name));
        params.push(ParameterSpec::new(&var.name, info.json_type, ParamOrigin::Path).required(true));
    }

    if let Some(validation) = validation {
        for field in &validation.fields {
            params.push(
                ParameterSpec::new(&field.name, kind_json_type(&field.kind), field_origin)
                    .required(field.required)
                    .with_default(field.default.clone()),
            );

            if path_vars.iter().any(|v| v.name == field.name) {
                conflicts.push(field.name.clone());
                // Without a handler hint the declared field kind types the shared value.
                if !handler_params.iter().any(|p| p.name == field.name) {
                    properties.insert(field.name.clone(), field_schema(field));
                    if let Some(path) = params
                        .iter_mut()
                        .find(|p| p.name == field.name && p.origin == ParamOrigin::Path)
                    {
                        path.json_type = kind_json_type(&field.kind);
                    }
                }
                if let Some(existing) = properties.get_mut(&field.name) {
                    existing["description"] = json!(format!(
                        "Path parameter '{}'; also declared as a {} field",
                        field.name,
                        origin_label(field_origin)
                    ));
                }
                continue;
            }

            properties.insert(field.name.clone(), field_schema(field));
            if field.required {
                required.push(json!(field.name));
            }
        }
    }

    // Remaining handler parameters travel like validation fields.
    for hint in handler_params {
        if properties.contains_key(&hint.name) {
            continue;
        }
        let info = parse_type_hint(&hint.type_hint);
        properties.insert(hint.name.clone(), info.schema);
        if !info.optional {
            required.push(json!(hint.name));
        }
        params.push(
            ParameterSpec::new(&hint.name, info.json_type, field_origin).required(!info.optional),
        );
    }

    if accepts_querystring(method) && !properties.contains_key(QUERYSTRING_PARAM) {
        properties.insert(
            QUERYSTRING_PARAM.to_string(),
            json!({
                "type": "object",
                "additionalProperties": true,
                "description": "Extra query string parameters, merged into the request URL"
            }),
        );
        params.push(ParameterSpec::new(
            QUERYSTRING_PARAM,
            JsonType::Object,
            ParamOrigin::Query,
        ));
    }

    Ok(GeneratedSchema {
        input_schema: object_value(properties, required),
        params,
        conflicts,
    })
}

fn origin_label(origin: ParamOrigin) -> &'static str {
    match origin {
        ParamOrigin::Path => "path",
        ParamOrigin::Query => "query",
        ParamOrigin::Body => "body",
        ParamOrigin::Auth => "auth",
    }
}
