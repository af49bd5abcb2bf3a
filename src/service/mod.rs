//! Service definitions.
//!
//! # Data Flow
//! ```text
//! ServiceDescriptor (name, methods, HTTP rules)
//!     → ServiceRegistrar::register_service (app builder)
//!     → RPC server: full method → handler
//!     → HTTP gateway: RouteDescriptor → route table
//! ```
//!
//! # Design Decisions
//! - One descriptor feeds both transports, so they cannot drift apart
//! - Handlers are erased behind `MethodHandler`; only they know concrete types

pub mod handler;
pub mod message;
pub mod shape;

use std::sync::Arc;

use crate::routing::{HttpRule, PatternError, RouteDescriptor};

pub use handler::{unary, MethodHandler};
pub use message::{downcast_ref, AnyMessage, Message, Payload, ValidationError};
pub use shape::Shape;

/// Static information about the method being called, handed to interceptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// `/package.Service/Method`
    pub full_method: String,
    pub service: String,
    pub method: String,
}

impl MethodInfo {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        let service = service.into();
        let method = method.into();
        Self {
            full_method: format!("/{service}/{method}"),
            service,
            method,
        }
    }
}

/// A method and its implementation.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub info: Arc<MethodInfo>,
    pub handler: Arc<dyn MethodHandler>,
}

/// Errors raised while describing a service.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {pattern:?} refers to unknown method {method:?}")]
    UnknownMethod { method: String, pattern: String },
    #[error("method {0:?} declared twice")]
    DuplicateMethod(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Everything needed to serve one service over both transports.
#[derive(Clone)]
pub struct ServiceDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
    routes: Vec<Arc<RouteDescriptor>>,
}

impl ServiceDescriptor {
    /// Start describing the service `name`, e.g. `echo.v1.EchoService`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Add a method reachable over RPC.
    pub fn method(mut self, name: &str, handler: Arc<dyn MethodHandler>) -> Result<Self, RouteError> {
        let info = Arc::new(MethodInfo::new(self.name.clone(), name));
        if self.methods.iter().any(|m| m.info.method == name) {
            return Err(RouteError::DuplicateMethod(info.full_method.clone()));
        }
        self.methods.push(MethodDescriptor { info, handler });
        Ok(self)
    }

    /// Expose an already declared method over HTTP.
    pub fn route(mut self, method: &str, rule: HttpRule) -> Result<Self, RouteError> {
        let target = self
            .methods
            .iter()
            .find(|m| m.info.method == method)
            .ok_or_else(|| RouteError::UnknownMethod {
                method: method.to_string(),
                pattern: format!("{rule:?}"),
            })?;

        let route = RouteDescriptor::new(rule, Arc::clone(&target.info), Arc::clone(&target.handler))?;
        self.routes.push(Arc::new(route));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.routes
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field(
                "methods",
                &self.methods.iter().map(|m| m.info.full_method.as_str()).collect::<Vec<_>>(),
            )
            .field("routes", &self.routes)
            .finish()
    }
}

/// Anything services can be registered with.
pub trait ServiceRegistrar {
    fn register_service(&mut self, service: ServiceDescriptor);
}
