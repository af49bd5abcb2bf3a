//! Error model shared by both transports.
//!
//! # Data Flow
//! ```text
//! handler / decoder / validator
//!     → Status (code, message, details)          status.rs
//!     ↳ BizError → Status (+ http status, cause)  biz.rs
//!
//! RPC boundary:  Status sent as-is
//! HTTP boundary: Status → mapper.rs → (HTTP status, JSON body)
//! ```
//!
//! # Design Decisions
//! - One error value (`Status`) flows through the whole pipeline
//! - Business errors are recognised by their HTTP status detail, never guessed
//! - Internal failures never leak their message to HTTP clients

pub mod biz;
pub mod mapper;
pub mod status;
pub mod zone;

pub use biz::{BizError, CauseMessage};
pub use mapper::{to_http, HttpError, FALLBACK_BODY, GENERIC_INTERNAL_MESSAGE};
pub use status::{Code, Detail, Status};
pub use zone::{Step, Zone, TEN_THOUSAND_STEP, THOUSAND_STEP};
