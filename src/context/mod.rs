//! Request-scoped context.
//!
//! # Data Flow
//! ```text
//! HTTP gateway / RPC server
//!     → RequestContext::builder() (route, raw request, metadata)
//!     → interceptors + handler (cheap clones of the same context)
//!     → outgoing metadata + response sink read back by the transport
//!     → dropped with the request
//! ```
//!
//! # Design Decisions
//! - One context per call, never shared across calls
//! - Passed explicitly to every interceptor and handler, no task-locals
//! - Only the outgoing metadata and response sink are mutable

pub mod metadata;
pub mod uploads;

use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};

use crate::routing::RouteDescriptor;

pub use metadata::MetadataMap;
pub use uploads::{UploadRef, UploadTable, UploadedFile};

/// Prefix marking outgoing metadata that should surface as an HTTP header.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// Front door a call arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Rpc,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Rpc => "rpc",
        }
    }
}

/// The parts of the inbound HTTP request visible to handlers.
#[derive(Debug, Clone)]
pub struct HttpRequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl HttpRequestInfo {
    pub fn from_parts(parts: &axum::http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }
}

/// Response adjustments requested by a handler, applied by the HTTP gateway.
#[derive(Debug, Default)]
pub struct ResponseSink {
    headers: Mutex<HeaderMap>,
    status: Mutex<Option<StatusCode>>,
}

impl ResponseSink {
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(name, value);
    }

    /// Override the status of a successful response.
    pub fn set_status(&self, status: StatusCode) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    pub(crate) fn take(&self) -> (HeaderMap, Option<StatusCode>) {
        let headers = std::mem::take(&mut *self.headers.lock().unwrap_or_else(|e| e.into_inner()));
        let status = self.status.lock().unwrap_or_else(|e| e.into_inner()).take();
        (headers, status)
    }
}

struct Inner {
    transport: Transport,
    request_id: Option<String>,
    route: Option<Arc<RouteDescriptor>>,
    http_request: Option<HttpRequestInfo>,
    response: Option<ResponseSink>,
    incoming: MetadataMap,
    outgoing: Option<Mutex<MetadataMap>>,
    uploads: UploadTable,
}

/// Per-call state threaded through interceptors and handlers.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

impl RequestContext {
    pub fn builder(transport: Transport) -> RequestContextBuilder {
        RequestContextBuilder {
            transport,
            request_id: None,
            route: None,
            http_request: None,
            response: false,
            incoming: MetadataMap::new(),
            outgoing: false,
        }
    }

    pub fn transport(&self) -> Transport {
        self.inner.transport
    }

    pub fn request_id(&self) -> Option<&str> {
        self.inner.request_id.as_deref()
    }

    /// The matched route. `None` for native RPC calls and routing fallbacks.
    pub fn route(&self) -> Option<&Arc<RouteDescriptor>> {
        self.inner.route.as_ref()
    }

    pub fn http_request(&self) -> Option<&HttpRequestInfo> {
        self.inner.http_request.as_ref()
    }

    pub fn response(&self) -> Option<&ResponseSink> {
        self.inner.response.as_ref()
    }

    pub fn incoming(&self) -> &MetadataMap {
        &self.inner.incoming
    }

    /// Mutate the outgoing metadata. Returns `None` when the context has none.
    pub fn update_outgoing<R>(&self, f: impl FnOnce(&mut MetadataMap) -> R) -> Option<R> {
        self.inner
            .outgoing
            .as_ref()
            .map(|md| f(&mut *md.lock().unwrap_or_else(|e| e.into_inner())))
    }

    /// Copy of the outgoing metadata as it stands now.
    pub fn outgoing(&self) -> MetadataMap {
        self.update_outgoing(|md| md.clone()).unwrap_or_default()
    }

    pub fn uploads(&self) -> &UploadTable {
        &self.inner.uploads
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("transport", &self.inner.transport)
            .field("request_id", &self.inner.request_id)
            .field("route", &self.inner.route.as_ref().map(|r| r.full_method()))
            .field("incoming", &self.inner.incoming)
            .finish_non_exhaustive()
    }
}

pub struct RequestContextBuilder {
    transport: Transport,
    request_id: Option<String>,
    route: Option<Arc<RouteDescriptor>>,
    http_request: Option<HttpRequestInfo>,
    response: bool,
    incoming: MetadataMap,
    outgoing: bool,
}

impl RequestContextBuilder {
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn route(mut self, route: Arc<RouteDescriptor>) -> Self {
        self.route = Some(route);
        self
    }

    /// Attach the raw HTTP request and a response sink.
    pub fn http_request(mut self, request: HttpRequestInfo) -> Self {
        self.http_request = Some(request);
        self.response = true;
        self
    }

    pub fn incoming(mut self, incoming: MetadataMap) -> Self {
        self.incoming = incoming;
        self
    }

    /// Allocate an empty outgoing metadata map.
    pub fn with_outgoing(mut self) -> Self {
        self.outgoing = true;
        self
    }

    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(Inner {
                transport: self.transport,
                request_id: self.request_id,
                route: self.route,
                http_request: self.http_request,
                response: self.response.then(ResponseSink::default),
                incoming: self.incoming,
                outgoing: self.outgoing.then(|| Mutex::new(MetadataMap::new())),
                uploads: UploadTable::new(),
            }),
        }
    }
}

/// Queue a response header for the caller.
///
/// Stored as `grpc-metadata-<name>` in the outgoing metadata; the HTTP
/// gateway strips the prefix when forwarding. Does nothing when the context
/// carries no outgoing metadata.
pub fn send_header<I, V>(ctx: &RequestContext, name: &str, values: I)
where
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    ctx.update_outgoing(|md| md.set(format!("{METADATA_HEADER_PREFIX}{name}"), values));
}
