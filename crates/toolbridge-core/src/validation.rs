//! Structured validation schemas declared by host handlers.
//!
//! A [`ValidationSchema`] describes the payload a handler validates: its
//! fields, their kinds, whether they are required and what they default to.
//! Hosts can build one by hand, convert an existing JSON Schema document, or
//! derive one from a Rust type through `schemars`.

use serde_json::{Map, Value};

/// Maximum `$ref` nesting followed when importing JSON Schema documents.
const MAX_REF_DEPTH: usize = 16;

/// The shape of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Homogeneous list of the inner kind.
    List(Box<FieldKind>),
    /// Nested structure with its own fields.
    Object(ValidationSchema),
    /// Free-form object (string keys, any values).
    Map,
    /// No constraint.
    Any,
}

/// One field of a validation schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub format: Option<String>,
    /// Allowed values, when the field is an enumeration.
    pub choices: Option<Vec<Value>>,
}

impl FieldSchema {
    /// A field the caller must supply.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: None,
            format: None,
            choices: None,
        }
    }

    /// A field the caller may omit.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = Some(choices);
        self
    }
}

/// Ordered collection of fields a handler validates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSchema {
    pub fields: Vec<FieldSchema>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Derive a schema from a type implementing [`schemars::JsonSchema`].
    pub fn of<T: schemars::JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let value = serde_json::to_value(&root).unwrap_or(Value::Null);
        Self::from_json_schema(&value)
    }

    /// Convert a JSON Schema object document into a validation schema.
    ///
    /// Local references (`#/definitions/..` and `#/$defs/..`) are resolved
    /// against the document root. Anything the conversion does not
    /// understand degrades to [`FieldKind::Any`].
    pub fn from_json_schema(document: &Value) -> Self {
        object_fields(document, document, 0)
    }
}

fn object_fields(schema: &Value, root: &Value, depth: usize) -> ValidationSchema {
    let schema = resolve(schema, root, depth);
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut fields = Vec::new();
    if let Some(properties) = schema["properties"].as_object() {
        for (name, property) in properties {
            let property = resolve(property, root, depth);
            let mut field = FieldSchema::optional(name, field_kind(property, root, depth + 1));
            field.required = required.contains(&name.as_str());
            field.default = property.get("default").cloned();
            field.description = property["description"].as_str().map(String::from);
            field.format = property["format"].as_str().map(String::from);
            field.choices = property["enum"].as_array().cloned();
            fields.push(field);
        }
    }

    ValidationSchema { fields }
}

fn field_kind(schema: &Value, root: &Value, depth: usize) -> FieldKind {
    if depth > MAX_REF_DEPTH {
        return FieldKind::Any;
    }
    let schema = resolve(schema, root, depth);

    match primary_type(schema) {
        Some("string") => FieldKind::String,
        Some("integer") => FieldKind::Integer,
        Some("number") => FieldKind::Number,
        Some("boolean") => FieldKind::Boolean,
        Some("array") => FieldKind::List(Box::new(field_kind(&schema["items"], root, depth + 1))),
        Some("object") => match schema["properties"].as_object() {
            Some(props) if !props.is_empty() => {
                FieldKind::Object(object_fields(schema, root, depth + 1))
            }
            _ => FieldKind::Map,
        },
        _ => FieldKind::Any,
    }
}

/// First non-null entry of `type`, which may be a string or an array.
fn primary_type(schema: &Value) -> Option<&str> {
    match &schema["type"] {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

/// Follow `$ref` (directly or as a lone `allOf` member) to its target.
fn resolve<'a>(schema: &'a Value, root: &'a Value, depth: usize) -> &'a Value {
    let mut current = schema;
    for _ in depth..MAX_REF_DEPTH {
        let reference = current["$ref"].as_str().or_else(|| match &current["allOf"] {
            Value::Array(all) if all.len() == 1 => all[0]["$ref"].as_str(),
            _ => None,
        });
        let Some(reference) = reference else {
            return current;
        };
        match lookup_ref(reference, root) {
            Some(target) => current = target,
            None => return current,
        }
    }
    current
}

fn lookup_ref<'a>(reference: &str, root: &'a Value) -> Option<&'a Value> {
    let path = reference.strip_prefix("#/")?;
    let mut node = root;
    for segment in path.split('/') {
        node = node.as_object().and_then(|m: &Map<String, Value>| m.get(segment))?;
    }
    Some(node)
}
