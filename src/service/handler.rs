//! Type-erased method handlers.
//!
//! A [`MethodHandler`] knows its concrete request type, so it is the one
//! place that turns decoded JSON or wire bytes into a typed request. The
//! transports only ever see [`Payload`]s.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::message::{Message, Payload};
use super::shape::Shape;
use crate::context::RequestContext;
use crate::errors::Status;

/// Implementation of one service method, shared by both transports.
pub trait MethodHandler: Send + Sync + 'static {
    /// JSON rendering of a blank request, the starting point of HTTP decoding.
    fn new_request(&self) -> Result<Value, Status>;

    /// Field types of the request, used to coerce text parameters.
    fn request_shape(&self) -> &Shape;

    /// Build the typed request from a fully decoded JSON value.
    fn decode_value(&self, value: Value) -> Result<Payload, Status>;

    /// Build the typed request from an RPC payload.
    fn decode_bytes(&self, bytes: &[u8]) -> Result<Payload, Status>;

    /// Run the method. The payload must be this handler's request type.
    fn call(&self, ctx: RequestContext, request: Payload) -> BoxFuture<'static, Result<Payload, Status>>;
}

/// Adapt an async function into a [`MethodHandler`].
///
/// ```ignore
/// let handler = unary(|_ctx, req: EchoRequest| async move {
///     Ok(EchoResponse { text: req.text })
/// });
/// ```
pub fn unary<Req, Resp, F, Fut>(f: F) -> Arc<dyn MethodHandler>
where
    Req: Message,
    Resp: Message,
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    Arc::new(Unary {
        f: Arc::new(f),
        shape: Shape::of::<Req>(),
        _types: PhantomData,
    })
}

struct Unary<Req, Resp, F> {
    f: Arc<F>,
    shape: Shape,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F, Fut> MethodHandler for Unary<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    fn new_request(&self) -> Result<Value, Status> {
        serde_json::to_value(Req::default())
            .map_err(|e| Status::internal(format!("failed to render blank request: {e}")))
    }

    fn request_shape(&self) -> &Shape {
        &self.shape
    }

    fn decode_value(&self, value: Value) -> Result<Payload, Status> {
        let request: Req = serde_json::from_value(value)?;
        Ok(Box::new(request))
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<Payload, Status> {
        if bytes.is_empty() {
            return Ok(Box::new(Req::default()));
        }
        let request: Req = serde_json::from_slice(bytes)?;
        Ok(Box::new(request))
    }

    fn call(&self, ctx: RequestContext, request: Payload) -> BoxFuture<'static, Result<Payload, Status>> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            let request = request
                .into_any()
                .downcast::<Req>()
                .map_err(|_| Status::internal("request payload has unexpected type"))?;
            let response = f(ctx, *request).await?;
            Ok(Box::new(response) as Payload)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Transport;
    use crate::errors::Code;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Ping {
        count: i64,
    }
    impl Message for Ping {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Pong {
        count: i64,
    }
    impl Message for Pong {}

    fn ping_handler() -> Arc<dyn MethodHandler> {
        unary(|_ctx, req: Ping| async move { Ok(Pong { count: req.count + 1 }) })
    }

    #[tokio::test]
    async fn unary_round_trip() {
        let handler = ping_handler();
        let request = handler.decode_bytes(br#"{"count": 41}"#).unwrap();
        let ctx = RequestContext::builder(Transport::Rpc).build();

        let response = handler.call(ctx, request).await.unwrap();
        assert_eq!(response.to_json().unwrap()["count"], 42);
    }

    #[test]
    fn blank_request_and_bad_json() {
        let handler = ping_handler();
        assert_eq!(handler.new_request().unwrap(), serde_json::json!({"count": 0}));

        assert_eq!(handler.request_shape().field("count"), Some(&Shape::Integer));

        let err = handler.decode_bytes(b"{\"count\": \"x\"}").err().unwrap();
        assert_eq!(err.canonical(), Some(Code::InvalidArgument));
    }

    #[tokio::test]
    async fn wrong_payload_type_is_internal() {
        let handler = ping_handler();
        let ctx = RequestContext::builder(Transport::Rpc).build();
        let err = handler.call(ctx, Box::new(Pong::default())).await.err().unwrap();
        assert_eq!(err.canonical(), Some(Code::Internal));
    }
}
