//! Per-request gateway pipeline.
//!
//! # Data Flow
//! ```text
//! axum fallback (every request not claimed by an additional handler)
//!     → route lookup (match | wrong verb | no route)
//!     → metadata annotators → RequestContext
//!     → body buffered → codec decode → typed request
//!     → composed interceptor chain → handler
//!     → response field selection → decorators → encode
//!     → (on any error) error handlers → status mapping → JSON status body
//!     → outgoing metadata forwarded as headers
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, request::Parts, HeaderValue, StatusCode};
use axum::response::Response;
use http_body_util::LengthLimitError;
use serde_json::Value;

use super::headers::forward_metadata;
use super::options::{
    ErrorHandler, MetadataAnnotator, OutgoingHeaderMatcher, ResponseDecorator, RoutingErrorHandler,
};
use crate::codec::{Codec, DecodeInput};
use crate::context::{HttpRequestInfo, MetadataMap, RequestContext, Transport};
use crate::errors::{to_http, Status, FALLBACK_BODY};
use crate::interceptor::Handler;
use crate::observability::metrics;
use crate::routing::{RouteDescriptor, RouteMatch, Router};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything needed to serve gateway routes. Immutable once built.
pub(crate) struct Gateway {
    pub(crate) routes: Router,
    pub(crate) handlers: HashMap<String, Handler>,
    pub(crate) codec: Codec,
    pub(crate) max_body_size: usize,
    pub(crate) not_found: RoutingErrorHandler,
    pub(crate) method_not_allowed: RoutingErrorHandler,
    pub(crate) error_handlers: Vec<ErrorHandler>,
    pub(crate) decorators: Vec<ResponseDecorator>,
    pub(crate) annotators: Vec<MetadataAnnotator>,
    pub(crate) header_matcher: OutgoingHeaderMatcher,
}

impl Gateway {
    pub(crate) async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();

        let info = HttpRequestInfo::from_parts(&parts);
        let mut incoming = MetadataMap::new();
        for annotate in &self.annotators {
            annotate(&info, &mut incoming);
        }

        let mut builder = RequestContext::builder(Transport::Http)
            .http_request(info)
            .incoming(incoming)
            .with_outgoing();
        if let Some(id) = parts.headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
            builder = builder.request_id(id);
        }

        let (response, method_label) = match self.routes.lookup(&parts.method, parts.uri.path()) {
            RouteMatch::Matched { route, vars } => {
                let ctx = builder.route(Arc::clone(&route)).build();
                let result = self.dispatch(&ctx, &route, &vars, &parts, body).await;
                (self.respond(&ctx, result), route.full_method().to_string())
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let ctx = builder.build();
                tracing::debug!(method = %parts.method, path = parts.uri.path(), "Method not allowed");
                let mut response = self.respond(&ctx, (self.method_not_allowed)(&ctx));
                let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                (response, "none".to_string())
            }
            RouteMatch::NotFound => {
                let ctx = builder.build();
                tracing::debug!(method = %parts.method, path = parts.uri.path(), "No route matched");
                (self.respond(&ctx, (self.not_found)(&ctx)), "none".to_string())
            }
        };

        metrics::record_request(
            Transport::Http,
            &method_label,
            response.status().as_str(),
            start,
        );
        response
    }

    /// Decode, call, and select the response value.
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        route: &RouteDescriptor,
        vars: &[(String, String)],
        parts: &Parts,
        body: Body,
    ) -> Result<Value, Status> {
        let call = self.handlers.get(route.full_method()).ok_or_else(|| {
            Status::unimplemented(format!("method {} is not served", route.full_method()))
        })?;

        let body = axum::body::to_bytes(body, self.max_body_size).await.map_err(|e| {
            if exceeds_body_limit(&e) {
                Status::resource_exhausted(format!(
                    "request body exceeds the limit of {} bytes",
                    self.max_body_size
                ))
            } else {
                Status::invalid_argument(format!("failed to read request body: {e}"))
            }
        })?;

        let handler = route.handler();
        let mut value = handler.new_request()?;
        let input = DecodeInput {
            headers: &parts.headers,
            query: parts.uri.query(),
            body: &body,
            route,
            vars,
            uploads: ctx.uploads(),
        };
        self.codec.decode(&input, &mut value).await?;
        let request = handler.decode_value(value)?;

        let response = call(ctx.clone(), request).await?;
        let value = response
            .to_json()
            .map_err(|e| Status::internal(format!("failed to render response: {e}")))?;

        let selector = route.response_field();
        if selector.is_empty() {
            return Ok(value);
        }
        Ok(selector.access(&value).cloned().unwrap_or(Value::Null))
    }

    /// Encode `result` (or its error) and apply response metadata.
    fn respond(&self, ctx: &RequestContext, result: Result<Value, Status>) -> Response {
        let encoded = result.and_then(|value| {
            let value = self.decorators.iter().fold(value, |value, decorate| decorate(value));
            self.codec.encode(&value)
        });

        let (sink_headers, status_override) = ctx.response().map(|sink| sink.take()).unwrap_or_default();

        let mut response = match encoded {
            Ok((content_type, bytes)) => {
                let mut response = Response::new(Body::from(bytes));
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
                if let Some(status) = status_override {
                    *response.status_mut() = status;
                }
                response
            }
            Err(status) => self.error_response(ctx, status),
        };

        forward_metadata(&ctx.outgoing(), &self.header_matcher, response.headers_mut());
        for (name, value) in sink_headers.iter() {
            response.headers_mut().append(name.clone(), value.clone());
        }
        response
    }

    fn error_response(&self, ctx: &RequestContext, status: Status) -> Response {
        let status = self
            .error_handlers
            .iter()
            .fold(status, |status, handle| handle(ctx, status));
        let mapped = to_http(&status);

        if mapped.status.is_server_error() {
            tracing::warn!(
                request_id = ctx.request_id().unwrap_or("-"),
                code = status.code(),
                message = status.message(),
                http_status = mapped.status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::debug!(
                request_id = ctx.request_id().unwrap_or("-"),
                code = status.code(),
                message = status.message(),
                http_status = mapped.status.as_u16(),
                "Request rejected"
            );
        }

        let (code, body) = match serde_json::to_vec(&mapped.body) {
            Ok(body) => (mapped.status, Body::from(body)),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, Body::from(FALLBACK_BODY)),
        };
        let mut response = Response::new(body);
        *response.status_mut() = code;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(crate::codec::json::CONTENT_TYPE),
        );
        response
    }
}

/// Whether a body read failed because the body was longer than allowed,
/// either here or in the body limit layer.
fn exceeds_body_limit(error: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
