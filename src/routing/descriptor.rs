//! Route and field-selection metadata.

use std::sync::Arc;

use axum::http::Method;
use serde_json::{Map, Value};

use super::pattern::{self, PatternError};
use crate::errors::Status;
use crate::service::{MethodHandler, MethodInfo};

/// Dotted path to a nested field of a message, e.g. `nested_value` or `user.profile`.
///
/// An empty path selects the whole message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    name: String,
}

impl KeyPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Select the whole message.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('.').filter(|s| !s.is_empty())
    }

    /// Mutable access to the selected sub-value.
    ///
    /// Null intermediate values become empty objects so unset optional
    /// sub-messages can be bound into.
    pub fn access_mut<'a>(&self, value: &'a mut Value) -> Result<&'a mut Value, Status> {
        self.segments().try_fold(value, |current, segment| {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(fields) => Ok(fields.entry(segment.to_string()).or_insert(Value::Null)),
                _ => Err(Status::internal(format!(
                    "field selector {}: {segment} is not a message",
                    self.name
                ))),
            }
        })
    }

    /// The selected sub-value, `None` when any segment is missing.
    pub fn access<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments().try_fold(value, |current, segment| current.get(segment))
    }
}

/// HTTP binding of a method: verb, path template and field selection.
#[derive(Debug, Clone)]
pub struct HttpRule {
    method: Method,
    pattern: String,
    request_field: KeyPath,
    response_field: KeyPath,
}

impl HttpRule {
    pub fn new(method: Method, pattern: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            request_field: KeyPath::none(),
            response_field: KeyPath::none(),
        }
    }

    pub fn get(pattern: impl Into<String>) -> Self {
        Self::new(Method::GET, pattern)
    }

    pub fn post(pattern: impl Into<String>) -> Self {
        Self::new(Method::POST, pattern)
    }

    pub fn put(pattern: impl Into<String>) -> Self {
        Self::new(Method::PUT, pattern)
    }

    pub fn delete(pattern: impl Into<String>) -> Self {
        Self::new(Method::DELETE, pattern)
    }

    pub fn patch(pattern: impl Into<String>) -> Self {
        Self::new(Method::PATCH, pattern)
    }

    /// Bind the JSON body into this request field instead of the whole request.
    pub fn request_field(mut self, name: impl Into<String>) -> Self {
        self.request_field = KeyPath::new(name);
        self
    }

    /// Emit only this response field as the HTTP body.
    pub fn response_field(mut self, name: impl Into<String>) -> Self {
        self.response_field = KeyPath::new(name);
        self
    }
}

/// Immutable description of one HTTP route onto one method.
pub struct RouteDescriptor {
    http_method: Method,
    path_pattern: String,
    path_parameters: Vec<String>,
    request_field: KeyPath,
    response_field: KeyPath,
    method: Arc<MethodInfo>,
    handler: Arc<dyn MethodHandler>,
}

impl RouteDescriptor {
    /// Build a route, deriving the path parameter names from the template.
    pub fn new(
        rule: HttpRule,
        method: Arc<MethodInfo>,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<Self, PatternError> {
        let path_parameters = pattern::parse(&rule.pattern)?;
        Ok(Self {
            http_method: rule.method,
            path_pattern: rule.pattern,
            path_parameters,
            request_field: rule.request_field,
            response_field: rule.response_field,
            method,
            handler,
        })
    }

    pub fn http_method(&self) -> &Method {
        &self.http_method
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn path_parameters(&self) -> &[String] {
        &self.path_parameters
    }

    pub fn request_field(&self) -> &KeyPath {
        &self.request_field
    }

    pub fn response_field(&self) -> &KeyPath {
        &self.response_field
    }

    pub fn method(&self) -> &Arc<MethodInfo> {
        &self.method
    }

    /// `/package.Service/Method`
    pub fn full_method(&self) -> &str {
        &self.method.full_method
    }

    pub fn handler(&self) -> &Arc<dyn MethodHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("http_method", &self.http_method)
            .field("path_pattern", &self.path_pattern)
            .field("path_parameters", &self.path_parameters)
            .field("request_field", &self.request_field)
            .field("response_field", &self.response_field)
            .field("full_method", &self.method.full_method)
            .finish()
    }
}
