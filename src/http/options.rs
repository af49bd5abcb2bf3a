//! HTTP gateway options.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::MethodRouter;
use serde_json::Value;
use tokio::net::TcpListener;

use super::headers::default_outgoing_header_matcher;
use crate::codec::Codec;
use crate::config::HttpConfig;
use crate::context::{HttpRequestInfo, MetadataMap, RequestContext};
use crate::errors::{BizError, Status};

/// Default time in-flight requests get after shutdown starts.
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(3);

/// Rewrites an error before it is mapped onto the response.
pub type ErrorHandler = Arc<dyn Fn(&RequestContext, Status) -> Status + Send + Sync>;

/// Transforms a successful response value before encoding.
pub type ResponseDecorator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Copies request data into incoming metadata.
pub type MetadataAnnotator = Arc<dyn Fn(&HttpRequestInfo, &mut MetadataMap) + Send + Sync>;

/// Maps an outgoing metadata key to a response header name, or drops it.
pub type OutgoingHeaderMatcher = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Produces the response for requests no route accepted.
pub type RoutingErrorHandler = Arc<dyn Fn(&RequestContext) -> Result<Value, Status> + Send + Sync>;

/// Configuration of the HTTP gateway server.
pub struct HttpOptions {
    pub(crate) address: String,
    pub(crate) listener: Option<TcpListener>,
    pub(crate) max_connections: usize,
    pub(crate) graceful_timeout: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) max_body_size: usize,
    pub(crate) codec: Codec,
    pub(crate) additional_routes: Vec<(String, MethodRouter)>,
    pub(crate) not_found: RoutingErrorHandler,
    pub(crate) method_not_allowed: RoutingErrorHandler,
    pub(crate) error_handlers: Vec<ErrorHandler>,
    pub(crate) decorators: Vec<ResponseDecorator>,
    pub(crate) annotators: Vec<MetadataAnnotator>,
    pub(crate) header_matcher: OutgoingHeaderMatcher,
}

impl HttpOptions {
    /// Listen on `address` (`host:port`) with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        let defaults = HttpConfig::default();
        Self {
            address: address.into(),
            listener: None,
            max_connections: defaults.max_connections,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            max_body_size: defaults.max_body_size,
            codec: Codec::default(),
            additional_routes: Vec::new(),
            not_found: Arc::new(|_ctx: &RequestContext| {
                Err(BizError::new(5, 404, "Not Found").to_status())
            }),
            method_not_allowed: Arc::new(|_ctx: &RequestContext| {
                Err(BizError::new(12, 405, "Method Not Allowed").to_status())
            }),
            error_handlers: Vec::new(),
            decorators: Vec::new(),
            annotators: Vec::new(),
            header_matcher: Arc::new(default_outgoing_header_matcher),
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.bind_address.clone())
            .max_connections(config.max_connections)
            .graceful_timeout(Duration::from_millis(config.graceful_timeout_ms))
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .max_body_size(config.max_body_size)
    }

    /// Serve on an already bound socket instead of binding the address.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Replace the request codec.
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Mount a plain axum handler beside the gateway routes.
    ///
    /// `path` uses axum syntax (`/health`, `/files/{*rest}`).
    pub fn additional_handler(mut self, path: impl Into<String>, handler: MethodRouter) -> Self {
        self.additional_routes.push((path.into(), handler));
        self
    }

    pub fn not_found_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, Status> + Send + Sync + 'static,
    {
        self.not_found = Arc::new(handler);
        self
    }

    pub fn method_not_allowed_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, Status> + Send + Sync + 'static,
    {
        self.method_not_allowed = Arc::new(handler);
        self
    }

    /// Error handlers run in registration order.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestContext, Status) -> Status + Send + Sync + 'static,
    {
        self.error_handlers.push(Arc::new(handler));
        self
    }

    /// Decorators run in registration order.
    pub fn response_decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Annotators run in registration order.
    pub fn metadata_annotator<F>(mut self, annotator: F) -> Self
    where
        F: Fn(&HttpRequestInfo, &mut MetadataMap) + Send + Sync + 'static,
    {
        self.annotators.push(Arc::new(annotator));
        self
    }

    pub fn outgoing_header_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.header_matcher = Arc::new(matcher);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for HttpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOptions")
            .field("address", &self.address)
            .field("prebound", &self.listener.is_some())
            .field("max_connections", &self.max_connections)
            .field("graceful_timeout", &self.graceful_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_body_size", &self.max_body_size)
            .field("codec", &self.codec)
            .field("error_handlers", &self.error_handlers.len())
            .field("decorators", &self.decorators.len())
            .field("annotators", &self.annotators.len())
            .finish_non_exhaustive()
    }
}
