//! RPC server options.

use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::RpcConfig;
use crate::http::DEFAULT_GRACEFUL_TIMEOUT;

/// Largest frame accepted unless configured otherwise.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Configuration of the RPC server.
#[derive(Debug)]
pub struct RpcOptions {
    pub(crate) address: String,
    pub(crate) listener: Option<TcpListener>,
    pub(crate) max_connections: usize,
    pub(crate) graceful_timeout: Duration,
    pub(crate) max_frame_size: usize,
}

impl RpcOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            listener: None,
            max_connections: RpcConfig::default().max_connections,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn from_config(config: &RpcConfig) -> Self {
        Self::new(config.bind_address.clone())
            .max_connections(config.max_connections)
            .graceful_timeout(Duration::from_millis(config.graceful_timeout_ms))
            .max_frame_size(config.max_frame_size)
    }

    /// Serve on an already bound socket instead of binding the address.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}
