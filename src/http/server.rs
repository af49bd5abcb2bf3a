//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Build the axum Router: additional handlers, gateway fallback, middleware
//! - Accept connections through the bounded listener
//! - Serve HTTP/1.1 and HTTP/2 on each connection via hyper-util
//! - On cancellation: stop accepting, let connections finish, force-close after the grace period

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::gateway::Gateway;
use super::options::HttpOptions;
use crate::context::Transport;
use crate::interceptor::Handler;
use crate::lifecycle::shutdown::drain;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::routing::{PatternError, RouteDescriptor, Router as RouteTable};

/// HTTP/JSON gateway server.
pub struct HttpServer {
    address: String,
    prebound: Option<TcpListener>,
    max_connections: usize,
    graceful_timeout: Duration,
    route_count: usize,
    router: axum::Router,
}

impl HttpServer {
    /// Compile `routes` and wire them to their composed handlers
    /// (keyed by full method name).
    pub fn new(
        options: HttpOptions,
        routes: &[Arc<RouteDescriptor>],
        handlers: HashMap<String, Handler>,
    ) -> Result<Self, PatternError> {
        let mut table = RouteTable::new();
        for route in routes {
            table.add(Arc::clone(route))?;
        }
        let route_count = table.len();

        let HttpOptions {
            address,
            listener,
            max_connections,
            graceful_timeout,
            request_timeout,
            max_body_size,
            codec,
            additional_routes,
            not_found,
            method_not_allowed,
            error_handlers,
            decorators,
            annotators,
            header_matcher,
        } = options;

        let gateway = Gateway {
            routes: table,
            handlers,
            codec,
            max_body_size,
            not_found,
            method_not_allowed,
            error_handlers,
            decorators,
            annotators,
            header_matcher,
        };

        let router = Self::build_router(gateway, additional_routes, request_timeout, max_body_size);
        Ok(Self {
            address,
            prebound: listener,
            max_connections,
            graceful_timeout,
            route_count,
            router,
        })
    }

    /// Build the axum Router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        gateway: Gateway,
        additional_routes: Vec<(String, axum::routing::MethodRouter)>,
        request_timeout: Duration,
        max_body_size: usize,
    ) -> axum::Router {
        let gateway = Arc::new(gateway);
        let router = additional_routes
            .into_iter()
            .fold(axum::Router::new(), |router, (path, handler)| router.route(&path, handler));

        router
            .fallback(move |request: Request| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.handle(request).await }
            })
            .layer(
                ServiceBuilder::new()
                    .layer(CatchPanicLayer::new())
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(max_body_size))
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Serve until `shutdown` is cancelled, then drain.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ListenerError> {
        let listener = match self.prebound {
            Some(listener) => Listener::from_tcp(listener, self.max_connections)?,
            None => Listener::bind(&self.address, self.max_connections).await?,
        };
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, routes = self.route_count, "HTTP server starting");

        let tracker = ConnectionTracker::new(Transport::Http);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let guard = tracker.track();
                        let router = self.router.clone();
                        let shutdown = shutdown.clone();
                        connections.spawn(async move {
                            let _permit = permit;
                            tracing::trace!(connection_id = %guard.id(), peer_addr = %peer_addr, "Serving HTTP connection");
                            serve_connection(stream, router, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        let aborted = drain(&mut connections, self.graceful_timeout).await;
        tracing::info!(aborted, "HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, router: axum::Router, shutdown: CancellationToken) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let service = TowerToHyperService::new(router);
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "HTTP connection closed with error");
    }
}
