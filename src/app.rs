//! Application composer.
//!
//! # Data Flow
//! ```text
//! App::builder(name)
//!     .http(HttpOptions) / .rpc(RpcOptions)
//!     .interceptor(..)   (registration order = outermost first)
//!     .service(ServiceDescriptor)
//!     .build()           → one composed chain per method, shared by both servers
//!     .serve(token)      → HTTP + RPC tasks; first error cancels the other
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpOptions, HttpServer};
use crate::interceptor::{Chain, Handler, Interceptor};
use crate::net::ListenerError;
use crate::routing::PatternError;
use crate::rpc::{RpcMethod, RpcOptions, RpcServer};
use crate::service::{ServiceDescriptor, ServiceRegistrar};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("no server configured: enable HTTP, RPC, or both")]
    NoServers,
    #[error("method {0} registered by more than one service")]
    DuplicateMethod(String),
    #[error("invalid route: {0}")]
    Route(#[from] PatternError),
    #[error("HTTP server: {0}")]
    Http(#[source] ListenerError),
    #[error("RPC server: {0}")]
    Rpc(#[source] ListenerError),
    #[error("server task failed: {0}")]
    Task(String),
}

/// Builder for [`App`].
pub struct AppBuilder {
    name: String,
    http: Option<HttpOptions>,
    rpc: Option<RpcOptions>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    services: Vec<ServiceDescriptor>,
}

impl AppBuilder {
    pub fn http(mut self, options: HttpOptions) -> Self {
        self.http = Some(options);
        self
    }

    pub fn rpc(mut self, options: RpcOptions) -> Self {
        self.rpc = Some(options);
        self
    }

    /// Append an interceptor. The first one added runs outermost.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace every interceptor added so far. Recovery and validation stay.
    pub fn reset_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.register_service(service);
        self
    }

    pub fn build(self) -> Result<App, AppError> {
        if self.http.is_none() && self.rpc.is_none() {
            return Err(AppError::NoServers);
        }

        let chain = Chain::with_defaults(self.interceptors);
        let mut methods: HashMap<String, RpcMethod> = HashMap::new();
        let mut routes = Vec::new();

        for service in &self.services {
            for method in service.methods() {
                let full_method = method.info.full_method.clone();
                if methods.contains_key(&full_method) {
                    return Err(AppError::DuplicateMethod(full_method));
                }
                let call: Handler = chain.compose(Arc::clone(&method.info), Arc::clone(&method.handler));
                methods.insert(
                    full_method,
                    RpcMethod {
                        info: Arc::clone(&method.info),
                        handler: Arc::clone(&method.handler),
                        call,
                    },
                );
            }
            routes.extend(service.routes().iter().cloned());
        }

        tracing::debug!(
            app = %self.name,
            services = self.services.len(),
            methods = methods.len(),
            routes = routes.len(),
            interceptors = chain.len(),
            "App built"
        );

        let http = match self.http {
            Some(options) => {
                let handlers = methods
                    .iter()
                    .map(|(name, method)| (name.clone(), Arc::clone(&method.call)))
                    .collect();
                Some(HttpServer::new(options, &routes, handlers)?)
            }
            None => None,
        };
        let rpc = self
            .rpc
            .map(|options| RpcServer::new(options, methods.into_values()));

        Ok(App {
            name: self.name,
            http,
            rpc,
        })
    }
}

impl ServiceRegistrar for AppBuilder {
    fn register_service(&mut self, service: ServiceDescriptor) {
        self.services.push(service);
    }
}

/// A configured application: up to one HTTP and one RPC server sharing services.
pub struct App {
    name: String,
    http: Option<HttpServer>,
    rpc: Option<RpcServer>,
}

impl App {
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder {
            name: name.into(),
            http: None,
            rpc: None,
            interceptors: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every configured server until `shutdown` is cancelled or one fails.
    ///
    /// The first failure cancels the remaining servers and is returned once
    /// they have drained.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let token = shutdown.child_token();
        let mut servers = JoinSet::new();

        if let Some(http) = self.http {
            let token = token.clone();
            servers.spawn(async move { http.run(token).await.map_err(AppError::Http) });
        }
        if let Some(rpc) = self.rpc {
            let token = token.clone();
            servers.spawn(async move { rpc.run(token).await.map_err(AppError::Rpc) });
        }
        tracing::info!(app = %self.name, servers = servers.len(), "App starting");

        let mut first_error = None;
        while let Some(joined) = servers.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(AppError::Task(e.to_string())));
            if let Err(e) = outcome {
                tracing::error!(app = %self.name, error = %e, "Server failed, stopping the app");
                token.cancel();
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(app = %self.name, "App stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::errors::Status;
    use crate::routing::HttpRule;
    use crate::service::unary;

    fn service(name: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(name)
            .method("Ping", unary(|_ctx: RequestContext, _req: ()| async move { Ok::<(), Status>(()) }))
            .and_then(|s| s.route("Ping", HttpRule::get("/ping")))
            .unwrap()
    }

    #[test]
    fn needs_a_server() {
        let err = App::builder("empty").service(service("a.Svc")).build().err().unwrap();
        assert!(matches!(err, AppError::NoServers));
    }

    #[test]
    fn duplicate_methods_are_rejected() {
        let err = App::builder("dup")
            .rpc(RpcOptions::new("127.0.0.1:0"))
            .service(service("a.Svc"))
            .service(service("a.Svc"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AppError::DuplicateMethod(m) if m == "/a.Svc/Ping"));
    }

    #[tokio::test]
    async fn bind_failure_surfaces_and_stops_siblings() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let app = App::builder("clash")
            .http(HttpOptions::new("127.0.0.1:0"))
            .rpc(RpcOptions::new(addr))
            .service(service("a.Svc"))
            .build()
            .unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            app.serve(CancellationToken::new()),
        )
        .await
        .expect("serve should stop after the bind failure");
        assert!(matches!(result, Err(AppError::Rpc(ListenerError::Bind(_)))));
    }
}
