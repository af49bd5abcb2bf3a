//! Request validation.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::{Handler, Interceptor};
use crate::context::RequestContext;
use crate::errors::Status;
use crate::service::{MethodInfo, Payload};

/// Rejects requests whose [`Message::validate`](crate::service::Message::validate)
/// fails, before the handler runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validate;

impl Interceptor for Validate {
    fn intercept(
        &self,
        ctx: RequestContext,
        request: Payload,
        info: Arc<MethodInfo>,
        next: Handler,
    ) -> BoxFuture<'static, Result<Payload, Status>> {
        if let Err(e) = request.validate() {
            tracing::debug!(full_method = %info.full_method, error = %e, "request rejected");
            return Box::pin(async move { Err(Status::invalid_argument(e.to_string())) });
        }
        next(ctx, request)
    }
}
