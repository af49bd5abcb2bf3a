//! RPC client.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::frame::{length_codec, CallFrame, Frame};
use super::options::DEFAULT_MAX_FRAME_SIZE;
use crate::context::MetadataMap;
use crate::errors::Status;
use crate::service::Message;

/// A connection to an RPC server.
///
/// Calls on one client are serialized; open several clients for parallel calls.
pub struct RpcClient {
    framed: Mutex<Framed<TcpStream, LengthDelimitedCodec>>,
    next_call_id: AtomicU64,
}

impl RpcClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        Self::connect_with_limit(addr, DEFAULT_MAX_FRAME_SIZE).await
    }

    pub async fn connect_with_limit(
        addr: impl ToSocketAddrs,
        max_frame_size: usize,
    ) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Mutex::new(Framed::new(stream, length_codec(max_frame_size))),
            next_call_id: AtomicU64::new(1),
        })
    }

    /// Call `full_method` (`/package.Service/Method`).
    ///
    /// Returns the response with the server's outgoing metadata, or the
    /// server's status unchanged.
    pub async fn call<Req, Resp>(
        &self,
        full_method: &str,
        request: &Req,
        metadata: MetadataMap,
    ) -> Result<(Resp, MetadataMap), Status>
    where
        Req: Message,
        Resp: Message,
    {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(request)
            .map_err(|e| Status::internal(format!("failed to encode request: {e}")))?;
        let frame = Frame::Call(CallFrame {
            call_id,
            method: full_method.to_string(),
            metadata,
            payload: Bytes::from(payload),
        })
        .encode()
        .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let mut framed = self.framed.lock().await;
        framed
            .send(frame)
            .await
            .map_err(|e| Status::unavailable(format!("send failed: {e}")))?;

        loop {
            let bytes = framed
                .next()
                .await
                .ok_or_else(|| Status::unavailable("connection closed by server"))?
                .map_err(|e| Status::unavailable(format!("receive failed: {e}")))?;

            let reply = match Frame::decode(bytes.freeze()) {
                Ok(Frame::Reply(reply)) if reply.call_id == call_id => reply,
                Ok(_) => continue,
                Err(e) => return Err(Status::internal(format!("malformed reply: {e}"))),
            };

            let payload = reply.result?;
            let response = if payload.is_empty() {
                Resp::default()
            } else {
                serde_json::from_slice(&payload)
                    .map_err(|e| Status::internal(format!("failed to decode response: {e}")))?
            };
            return Ok((response, reply.metadata));
        }
    }
}
