//! RPC server.
//!
//! # Responsibilities
//! - Accept connections through the bounded listener
//! - Read call frames, run each call as its own task, write replies as they finish
//! - Route calls by full method name to the composed interceptor chain
//! - On cancellation: stop reading new calls, finish in-flight ones, bounded by the grace period

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::frame::{length_codec, CallFrame, Frame, ReplyFrame};
use super::options::RpcOptions;
use crate::context::{MetadataMap, RequestContext, Transport};
use crate::errors::Status;
use crate::interceptor::Handler;
use crate::lifecycle::shutdown::drain;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::service::{MethodHandler, MethodInfo};

const REPLY_QUEUE: usize = 64;

/// A servable method: its decoder and its composed call chain.
#[derive(Clone)]
pub struct RpcMethod {
    pub info: Arc<MethodInfo>,
    pub handler: Arc<dyn MethodHandler>,
    pub call: Handler,
}

type MethodTable = Arc<HashMap<String, RpcMethod>>;

/// Unary RPC server over length-delimited TCP frames.
pub struct RpcServer {
    address: String,
    prebound: Option<TcpListener>,
    max_connections: usize,
    graceful_timeout: Duration,
    max_frame_size: usize,
    methods: MethodTable,
}

impl RpcServer {
    pub fn new(options: RpcOptions, methods: impl IntoIterator<Item = RpcMethod>) -> Self {
        let methods = methods
            .into_iter()
            .map(|m| (m.info.full_method.clone(), m))
            .collect();
        Self {
            address: options.address,
            prebound: options.listener,
            max_connections: options.max_connections,
            graceful_timeout: options.graceful_timeout,
            max_frame_size: options.max_frame_size,
            methods: Arc::new(methods),
        }
    }

    /// Serve until `shutdown` is cancelled, then drain.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ListenerError> {
        let listener = match self.prebound {
            Some(listener) => Listener::from_tcp(listener, self.max_connections)?,
            None => Listener::bind(&self.address, self.max_connections).await?,
        };
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, methods = self.methods.len(), "RPC server starting");

        let tracker = ConnectionTracker::new(Transport::Rpc);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let guard = tracker.track();
                        let methods = Arc::clone(&self.methods);
                        let shutdown = shutdown.clone();
                        let max_frame_size = self.max_frame_size;
                        connections.spawn(async move {
                            let _permit = permit;
                            tracing::trace!(connection_id = %guard.id(), peer_addr = %peer_addr, "Serving RPC connection");
                            serve_connection(stream, methods, max_frame_size, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        let aborted = drain(&mut connections, self.graceful_timeout).await;
        tracing::info!(aborted, "RPC server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    methods: MethodTable,
    max_frame_size: usize,
    shutdown: CancellationToken,
) {
    let (mut sink, mut frames) = Framed::new(stream, length_codec(max_frame_size)).split();
    let (tx, mut rx) = mpsc::channel::<ReplyFrame>(REPLY_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            let call_id = reply.call_id;
            let Some(bytes) = encode_reply(reply, max_frame_size) else {
                continue;
            };
            if let Err(e) = sink.send(bytes).await {
                tracing::debug!(call_id, error = %e, "RPC connection write failed");
                break;
            }
        }
    });

    let mut calls = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = frames.next() => match frame {
                None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "RPC connection read failed");
                    break;
                }
                Some(Ok(bytes)) => match Frame::decode(bytes.freeze()) {
                    Ok(Frame::Call(call)) => {
                        let tx = tx.clone();
                        let methods = Arc::clone(&methods);
                        calls.spawn(async move {
                            let reply = dispatch(&methods, call).await;
                            let call_id = reply.call_id;
                            if tx.send(reply).await.is_err() {
                                tracing::debug!(call_id, "Reply dropped, connection writer has stopped");
                            }
                        });
                    }
                    Ok(Frame::Reply(reply)) => {
                        tracing::debug!(call_id = reply.call_id, "Unexpected reply frame from client");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Malformed RPC frame");
                        break;
                    }
                },
            },
            Some(_) = calls.join_next(), if !calls.is_empty() => {}
        }
    }

    while calls.join_next().await.is_some() {}
    drop(tx);
    let _ = writer.await;
}

/// Encode `reply`, replacing it with an error reply for the same call when it
/// cannot be encoded or would exceed the frame limit.
fn encode_reply(reply: ReplyFrame, max_frame_size: usize) -> Option<Bytes> {
    let call_id = reply.call_id;
    let status = match Frame::Reply(reply).encode() {
        Ok(bytes) if bytes.len() <= max_frame_size => return Some(bytes),
        Ok(bytes) => Status::resource_exhausted(format!(
            "reply of {} bytes exceeds the frame limit of {max_frame_size} bytes",
            bytes.len()
        )),
        Err(e) => Status::internal(format!("failed to encode reply: {e}")),
    };
    tracing::warn!(call_id, code = status.code(), reason = status.message(), "Sending error reply in place of the result");

    let fallback = Frame::Reply(ReplyFrame {
        call_id,
        metadata: MetadataMap::new(),
        result: Err(status),
    });
    match fallback.encode() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(call_id, error = %e, "Failed to encode error reply");
            None
        }
    }
}

async fn dispatch(methods: &HashMap<String, RpcMethod>, call: CallFrame) -> ReplyFrame {
    let start = Instant::now();
    let CallFrame {
        call_id,
        method: full_method,
        metadata,
        payload,
    } = call;

    let request_id = match metadata.get("x-request-id") {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    let ctx = RequestContext::builder(Transport::Rpc)
        .with_outgoing()
        .request_id(request_id)
        .incoming(metadata)
        .build();

    let result = match methods.get(&full_method) {
        Some(method) => invoke(method, &ctx, &payload).await,
        None => Err(Status::unimplemented(format!("unknown method {full_method}"))),
    };

    let status_label = match &result {
        Ok(_) => "OK".to_string(),
        Err(status) => status
            .canonical()
            .map(|code| code.as_str().to_string())
            .unwrap_or_else(|| status.code().to_string()),
    };
    if let Err(status) = &result {
        tracing::debug!(full_method = %full_method, code = status.code(), message = status.message(), "RPC call failed");
    }
    metrics::record_request(Transport::Rpc, &full_method, &status_label, start);

    ReplyFrame {
        call_id,
        metadata: ctx.outgoing(),
        result,
    }
}

async fn invoke(method: &RpcMethod, ctx: &RequestContext, payload: &[u8]) -> Result<Bytes, Status> {
    let request = method.handler.decode_bytes(payload)?;
    let response = (method.call)(ctx.clone(), request).await?;
    response
        .to_json()
        .and_then(|value| serde_json::to_vec(&value))
        .map(Bytes::from)
        .map_err(|e| Status::internal(format!("failed to render response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Code;

    fn reply(payload: Bytes) -> ReplyFrame {
        ReplyFrame {
            call_id: 7,
            metadata: MetadataMap::new(),
            result: Ok(payload),
        }
    }

    #[test]
    fn replies_within_the_limit_pass_through() {
        let bytes = encode_reply(reply(Bytes::from_static(b"{\"ok\":true}")), 1024).unwrap();
        assert_eq!(Frame::decode(bytes).unwrap(), Frame::Reply(reply(Bytes::from_static(b"{\"ok\":true}"))));
    }

    #[test]
    fn oversized_reply_becomes_resource_exhausted() {
        let bytes = encode_reply(reply(Bytes::from(vec![b'x'; 4096])), 1024).unwrap();
        assert!(bytes.len() <= 1024);

        let Frame::Reply(decoded) = Frame::decode(bytes).unwrap() else {
            panic!("expected a reply frame");
        };
        assert_eq!(decoded.call_id, 7);
        let status = decoded.result.unwrap_err();
        assert_eq!(status.canonical(), Some(Code::ResourceExhausted));
        assert!(status.message().contains("exceeds the frame limit of 1024 bytes"));
    }
}
