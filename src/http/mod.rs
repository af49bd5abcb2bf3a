//! HTTP/JSON gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper-util, tower-http layers)
//!     → gateway.rs (route lookup, decode, interceptor chain, encode)
//!     → headers.rs (metadata ⇄ header bridge)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Gateway routes live in one fallback handler, so additional axum routes take precedence
//! - Hooks (annotators, decorators, error handlers) run in registration order

mod gateway;
pub mod headers;
pub mod options;
pub mod server;

pub use headers::{cookie_annotator, default_outgoing_header_matcher};
pub use options::{
    ErrorHandler, HttpOptions, MetadataAnnotator, OutgoingHeaderMatcher, ResponseDecorator,
    RoutingErrorHandler, DEFAULT_GRACEFUL_TIMEOUT,
};
pub use server::HttpServer;
