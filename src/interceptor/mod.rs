//! Unary interceptor chain shared by both transports.
//!
//! # Data Flow
//! ```text
//! transport (HTTP gateway | RPC server)
//!     → composed handler for the method (built once)
//!         → interceptor[0] → interceptor[1] → ... (registration order)
//!         → recovery.rs (panics → INTERNAL)
//!         → validate.rs (Message::validate → INVALID_ARGUMENT)
//!         → MethodHandler::call
//! ```
//!
//! # Design Decisions
//! - First registered interceptor is outermost
//! - The chain is folded into one closure per method at startup, never per call
//! - Recovery and validation are always innermost, even after a reset

pub mod recovery;
pub mod validate;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::RequestContext;
use crate::errors::Status;
use crate::service::{MethodHandler, MethodInfo, Payload};

pub use recovery::Recovery;
pub use validate::Validate;

/// The next step of the chain: remaining interceptors plus the handler.
pub type Handler =
    Arc<dyn Fn(RequestContext, Payload) -> BoxFuture<'static, Result<Payload, Status>> + Send + Sync>;

/// Middleware around a single unary call.
pub trait Interceptor: Send + Sync + 'static {
    fn intercept(
        &self,
        ctx: RequestContext,
        request: Payload,
        info: Arc<MethodInfo>,
        next: Handler,
    ) -> BoxFuture<'static, Result<Payload, Status>>;
}

struct FnInterceptor<F>(F);

impl<F, Fut> Interceptor for FnInterceptor<F>
where
    F: Fn(RequestContext, Payload, Arc<MethodInfo>, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, Status>> + Send + 'static,
{
    fn intercept(
        &self,
        ctx: RequestContext,
        request: Payload,
        info: Arc<MethodInfo>,
        next: Handler,
    ) -> BoxFuture<'static, Result<Payload, Status>> {
        Box::pin((self.0)(ctx, request, info, next))
    }
}

/// Build an interceptor from an async function.
///
/// ```ignore
/// let logging = interceptor::from_fn(|ctx, req, info, next| async move {
///     tracing::info!(full_method = %info.full_method, "call");
///     next(ctx, req).await
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn Interceptor>
where
    F: Fn(RequestContext, Payload, Arc<MethodInfo>, Handler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, Status>> + Send + 'static,
{
    Arc::new(FnInterceptor(f))
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    /// `interceptors` followed by panic recovery and validation.
    pub fn with_defaults(mut interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        interceptors.push(Arc::new(Recovery));
        interceptors.push(Arc::new(Validate));
        Self { interceptors }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Fold the chain around `handler` into a single callable.
    pub fn compose(&self, info: Arc<MethodInfo>, handler: Arc<dyn MethodHandler>) -> Handler {
        let terminal: Handler = Arc::new(move |ctx, request| handler.call(ctx, request));

        self.interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| {
                let interceptor = Arc::clone(interceptor);
                let info = Arc::clone(&info);
                Arc::new(move |ctx, request| {
                    interceptor.intercept(ctx, request, Arc::clone(&info), Arc::clone(&next))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::context::Transport;
    use crate::service::{unary, Message};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Note {
        text: String,
    }
    impl Message for Note {}

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn Interceptor> {
        let log = Arc::clone(log);
        from_fn(move |ctx, req, _info, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:before"));
                let result = next(ctx, req).await;
                log.lock().unwrap().push(format!("{name}:after"));
                result
            }
        })
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let handler = unary(move |_ctx, req: Note| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler".to_string());
                Ok(req)
            }
        });

        let chain = Chain::new(vec![recorder(&log, "A"), recorder(&log, "B")]);
        let call = chain.compose(Arc::new(MethodInfo::new("svc", "Note")), handler);
        let ctx = RequestContext::builder(Transport::Rpc).build();
        call(ctx, Box::new(Note { text: "x".into() })).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["A:before", "B:before", "handler", "B:after", "A:after"]
        );
    }

    #[tokio::test]
    async fn interceptor_can_short_circuit() {
        let deny = from_fn(|_ctx, _req, info: Arc<MethodInfo>, _next| async move {
            Err(Status::permission_denied(format!("{} is closed", info.method)))
        });
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let handler = unary(move |_ctx, req: Note| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock().unwrap() = true;
                Ok(req)
            }
        });

        let call = Chain::new(vec![deny]).compose(Arc::new(MethodInfo::new("svc", "Note")), handler);
        let err = call(RequestContext::builder(Transport::Rpc).build(), Box::new(Note::default()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.message(), "Note is closed");
        assert!(!*reached.lock().unwrap());
    }
}
