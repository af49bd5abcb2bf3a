//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use super::{Handler, Interceptor};
use crate::context::RequestContext;
use crate::errors::Status;
use crate::service::{MethodInfo, Payload};

/// Turns a panic anywhere below it into an INTERNAL status.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Interceptor for Recovery {
    fn intercept(
        &self,
        ctx: RequestContext,
        request: Payload,
        info: Arc<MethodInfo>,
        next: Handler,
    ) -> BoxFuture<'static, Result<Payload, Status>> {
        Box::pin(async move {
            match AssertUnwindSafe(next(ctx, request)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(
                        full_method = %info.full_method,
                        panic = %reason,
                        "handler panicked"
                    );
                    Err(Status::internal(format!("panic: {reason}")))
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
