//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     ServiceDescriptor.routes
//!     → pattern.rs (parameter names, anchored regex)
//!     → router.rs (ordered route table)
//!     → Freeze as immutable Router
//!
//! Incoming Request (method, path)
//!     → router.rs lookup
//!     → Matched { route, vars } | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Parameter names derived from the template, never declared twice
//! - Deterministic: same input always matches same route

pub mod descriptor;
pub mod pattern;
pub mod router;

pub use descriptor::{HttpRule, KeyPath, RouteDescriptor};
pub use pattern::{parse, CompiledPattern, PatternError};
pub use router::{RouteMatch, Router};
