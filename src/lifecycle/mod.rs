//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the root CancellationToken
//!     second signal  → exit(1)
//!
//! Shutdown (shutdown.rs):
//!     token cancelled → servers stop accepting
//!     → connections finish in-flight calls
//!     → stragglers aborted once the grace period ends
//! ```
//!
//! # Design Decisions
//! - Servers only see a CancellationToken, never signals directly
//! - Shutdown has a deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::drain;
pub use signals::{install, SignalError};
