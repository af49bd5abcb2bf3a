//! Native RPC transport.
//!
//! # Data Flow
//! ```text
//! client                                server
//!   RpcClient::call                       accept (net::Listener)
//!     → CallFrame ──── TCP frames ────▶     → frame.rs decode
//!                                           → per-call task
//!                                           → composed interceptor chain → handler
//!     ◀── ReplyFrame (payload | status) ◀── → writer task
//! ```
//!
//! # Design Decisions
//! - One frame format in both directions, carrying metadata beside the payload
//! - Calls on one connection run concurrently; replies may arrive out of order
//! - Errors travel as the full status, details included

pub mod client;
pub mod frame;
pub mod options;
pub mod server;

pub use client::RpcClient;
pub use frame::{CallFrame, Frame, FrameError, ReplyFrame};
pub use options::{RpcOptions, DEFAULT_MAX_FRAME_SIZE};
pub use server::{RpcMethod, RpcServer};
