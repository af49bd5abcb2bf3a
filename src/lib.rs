//! RPC + HTTP/JSON gateway.
//!
//! Serves one set of service definitions over two front doors: a native
//! framed RPC transport and an HTTP/JSON gateway that maps annotated routes
//! onto the same methods.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client                                         RPC client
//!       │                                                   │
//!       ▼                                                   ▼
//!  ┌──────────┐   ┌───────────┐   ┌──────────┐        ┌──────────┐
//!  │   net    │──▶│   http    │──▶│ routing  │        │   net    │
//!  │ listener │   │  server   │   │  router  │        │ listener │
//!  └──────────┘   └───────────┘   └────┬─────┘        └────┬─────┘
//!                                      ▼                   ▼
//!                                 ┌──────────┐        ┌──────────┐
//!                                 │  codec   │        │   rpc    │
//!                                 │ decoders │        │  frames  │
//!                                 └────┬─────┘        └────┬─────┘
//!                                      └────────┬──────────┘
//!                                               ▼
//!                                   ┌───────────────────────┐
//!                                   │ interceptor chain     │
//!                                   │ (user → recovery →    │
//!                                   │  validation)          │
//!                                   └──────────┬────────────┘
//!                                              ▼
//!                                   ┌───────────────────────┐
//!                                   │ service handler       │
//!                                   └───────────────────────┘
//!
//!  Cross-cutting: errors (status, bizerr, zones), context (metadata,
//!  uploads), config, lifecycle (signals, drain), observability
//! ```

// Core subsystems
pub mod app;
pub mod codec;
pub mod context;
pub mod errors;
pub mod http;
pub mod interceptor;
pub mod routing;
pub mod rpc;
pub mod service;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use app::{App, AppBuilder, AppError};
pub use context::{send_header, MetadataMap, RequestContext};
pub use errors::{BizError, Code, Status};
pub use http::HttpOptions;
pub use routing::HttpRule;
pub use rpc::{RpcClient, RpcOptions};
pub use service::{unary, Message, ServiceDescriptor, ValidationError};
