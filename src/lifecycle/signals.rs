//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT/SIGTERM handlers once per process
//! - Translate the first signal into a cancelled token
//! - Exit immediately on the second signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second install is an error rather than a silent second listener

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("signal handlers are already installed")]
    AlreadyInstalled,
    #[error("failed to register signal handler: {0}")]
    Register(#[source] std::io::Error),
}

/// Register the handlers and return the token they cancel.
///
/// Must be called from within a Tokio runtime.
pub fn install() -> Result<CancellationToken, SignalError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(SignalError::AlreadyInstalled);
    }

    let mut listener = match SignalListener::register() {
        Ok(listener) => listener,
        Err(e) => {
            INSTALLED.store(false, Ordering::SeqCst);
            return Err(SignalError::Register(e));
        }
    };

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        let name = listener.recv().await;
        tracing::info!(signal = name, "Shutdown signal received, draining");
        cancel.cancel();

        let name = listener.recv().await;
        tracing::warn!(signal = name, "Second shutdown signal received, exiting");
        std::process::exit(1);
    });

    Ok(token)
}

#[cfg(unix)]
struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}
