//! Translation of declared authentication schemes into tool parameters and
//! outgoing `Authorization` headers.
//!
//! A route declaring [`SecurityScheme::Bearer`] gains an `auth_token`
//! argument; [`SecurityScheme::Basic`] gains `username` and `password`.
//! At call time those arguments are validated, removed from the argument
//! set and turned into a header for the internal request.

use crate::schema::{JsonType, ParamOrigin, ParameterSpec};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{json, Map, Value};
use std::fmt;
use toolbridge_core::SecurityScheme;

pub const AUTH_TOKEN_PARAM: &str = "auth_token";
pub const USERNAME_PARAM: &str = "username";
pub const PASSWORD_PARAM: &str = "password";

/// Argument names a scheme contributes.
pub fn auth_parameters(scheme: SecurityScheme) -> &'static [&'static str] {
    match scheme {
        SecurityScheme::Bearer => &[AUTH_TOKEN_PARAM],
        SecurityScheme::Basic => &[USERNAME_PARAM, PASSWORD_PARAM],
    }
}

/// Parameter specs for a scheme's credentials.
pub fn auth_specs(scheme: SecurityScheme) -> Vec<ParameterSpec> {
    auth_parameters(scheme)
        .iter()
        .map(|name| ParameterSpec::new(*name, JsonType::String, ParamOrigin::Auth).required(true))
        .collect()
}

fn describe(name: &str) -> &'static str {
    match name {
        AUTH_TOKEN_PARAM => "Bearer token sent as the Authorization header",
        USERNAME_PARAM => "Username for HTTP Basic authentication",
        _ => "Password for HTTP Basic authentication",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingCredential,
    InvalidCredential,
}

impl AuthErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorKind::MissingCredential => "missing_credential",
            AuthErrorKind::InvalidCredential => "invalid_credential",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::MissingCredential => f.write_str("missing"),
            AuthErrorKind::InvalidCredential => f.write_str("invalid"),
        }
    }
}

/// Credentials required by a tool were absent or unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {scheme:?} credentials: {}", .missing.join(", "))]
pub struct AuthValidationError {
    pub kind: AuthErrorKind,
    pub scheme: SecurityScheme,
    /// Offending argument names.
    pub missing: Vec<String>,
}

impl AuthValidationError {
    fn missing(scheme: SecurityScheme, names: Vec<String>) -> Self {
        Self {
            kind: AuthErrorKind::MissingCredential,
            scheme,
            missing: names,
        }
    }

    fn invalid(scheme: SecurityScheme, name: &str) -> Self {
        Self {
            kind: AuthErrorKind::InvalidCredential,
            scheme,
            missing: vec![name.to_string()],
        }
    }
}

enum Credential<'a> {
    Absent,
    Present(&'a str),
    Unusable,
}

fn credential<'a>(args: &'a Map<String, Value>, name: &str) -> Credential<'a> {
    match args.get(name) {
        None | Some(Value::Null) => Credential::Absent,
        Some(Value::String(s)) if s.is_empty() => Credential::Absent,
        Some(Value::String(s)) => Credential::Present(s),
        Some(_) => Credential::Unusable,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityTranslator {
    expose_auth_as_params: bool,
}

impl Default for SecurityTranslator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SecurityTranslator {
    pub fn new(expose_auth_as_params: bool) -> Self {
        Self {
            expose_auth_as_params,
        }
    }

    pub fn exposes_params(&self) -> bool {
        self.expose_auth_as_params
    }

    /// Add the scheme's credential properties to an input schema.
    pub fn merge_schema(&self, base: &Value, scheme: Option<SecurityScheme>) -> Value {
        let mut schema = base.clone();
        let Some(scheme) = scheme else {
            return schema;
        };
        if !self.expose_auth_as_params {
            return schema;
        }

        if !schema["properties"].is_object() {
            schema["properties"] = json!({});
        }
        let mut required: Vec<Value> = schema["required"].as_array().cloned().unwrap_or_default();
        for name in auth_parameters(scheme) {
            schema["properties"][*name] = json!({
                "type": "string",
                "description": describe(name),
            });
            if !required.iter().any(|r| r == *name) {
                required.push(json!(name));
            }
        }
        schema["required"] = Value::Array(required);
        schema
    }

    /// Check credentials before anything is dispatched.
    ///
    /// With `expose_auth_as_params` disabled, a call carrying none of the
    /// credential arguments is accepted when the inbound request already
    /// has an `Authorization` header.
    pub fn validate(
        &self,
        args: &Map<String, Value>,
        scheme: Option<SecurityScheme>,
        inbound: &HeaderMap,
    ) -> Result<(), AuthValidationError> {
        let Some(scheme) = scheme else {
            return Ok(());
        };

        let names = auth_parameters(scheme);
        let mut missing = Vec::new();
        for name in names {
            match credential(args, name) {
                Credential::Absent => missing.push(name.to_string()),
                Credential::Unusable => return Err(AuthValidationError::invalid(scheme, name)),
                Credential::Present(_) => {}
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        if missing.len() == names.len() && self.falls_back(inbound) {
            return Ok(());
        }
        Err(AuthValidationError::missing(scheme, missing))
    }

    fn falls_back(&self, inbound: &HeaderMap) -> bool {
        !self.expose_auth_as_params && inbound.contains_key(AUTHORIZATION)
    }

    /// Build the `Authorization` header and strip credential arguments.
    pub fn extract_headers(
        &self,
        mut args: Map<String, Value>,
        scheme: Option<SecurityScheme>,
        inbound: &HeaderMap,
    ) -> Result<(HeaderMap, Map<String, Value>), AuthValidationError> {
        let mut headers = HeaderMap::new();
        let Some(scheme) = scheme else {
            return Ok((headers, args));
        };

        self.validate(&args, Some(scheme), inbound)?;

        let value = match scheme {
            SecurityScheme::Bearer => match credential(&args, AUTH_TOKEN_PARAM) {
                Credential::Present(token) => Some(
                    HeaderValue::from_str(&format!("Bearer {token}"))
                        .map_err(|_| AuthValidationError::invalid(scheme, AUTH_TOKEN_PARAM))?,
                ),
                _ => None,
            },
            SecurityScheme::Basic => {
                match (
                    credential(&args, USERNAME_PARAM),
                    credential(&args, PASSWORD_PARAM),
                ) {
                    (Credential::Present(user), Credential::Present(password)) => {
                        if user.contains(':') {
                            return Err(AuthValidationError::invalid(scheme, USERNAME_PARAM));
                        }
                        let encoded = STANDARD.encode(format!("{user}:{password}"));
                        Some(
                            HeaderValue::from_str(&format!("Basic {encoded}"))
                                .map_err(|_| AuthValidationError::invalid(scheme, PASSWORD_PARAM))?,
                        )
                    }
                    _ => None,
                }
            }
        };

        match value {
            Some(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                if let Some(inbound) = inbound.get(AUTHORIZATION) {
                    headers.insert(AUTHORIZATION, inbound.clone());
                }
            }
        }

        for name in auth_parameters(scheme) {
            args.remove(*name);
        }
        Ok((headers, args))
    }
}
