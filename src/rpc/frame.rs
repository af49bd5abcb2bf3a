//! RPC wire frames.
//!
//! Frames travel inside a `u32` big-endian length prefix
//! ([`LengthDelimitedCodec`]). The frame body is:
//!
//! ```text
//! call:  0x01 | call_id u64 | method (u16 len + utf8) | metadata | JSON request
//! reply: 0x02 | call_id u64 | metadata | JSON response
//!        0x03 | call_id u64 | metadata | JSON status
//!
//! metadata: u16 entry count, then per value: key (u16 len + utf8), value (u32 len + utf8)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::LengthDelimitedCodec;

use crate::context::MetadataMap;
use crate::errors::Status;

const KIND_CALL: u8 = 0x01;
const KIND_REPLY_OK: u8 = 0x02;
const KIND_REPLY_ERR: u8 = 0x03;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),
    #[error("unknown frame kind {0:#04x}")]
    UnknownKind(u8),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("{what} too long: {len} bytes")]
    TooLong { what: &'static str, len: usize },
    #[error("malformed status: {0}")]
    Status(#[from] serde_json::Error),
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// A request for one unary call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub call_id: u64,
    /// `/package.Service/Method`
    pub method: String,
    pub metadata: MetadataMap,
    pub payload: Bytes,
}

/// The outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFrame {
    pub call_id: u64,
    pub metadata: MetadataMap,
    pub result: Result<Bytes, Status>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call(CallFrame),
    Reply(ReplyFrame),
}

/// Length-prefix codec bounded by `max_frame_size`.
pub fn length_codec(max_frame_size: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_size)
        .new_codec()
}

impl Frame {
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::new();
        match self {
            Frame::Call(call) => {
                buf.put_u8(KIND_CALL);
                buf.put_u64(call.call_id);
                put_str16(&mut buf, "method", &call.method)?;
                put_metadata(&mut buf, &call.metadata)?;
                buf.put_slice(&call.payload);
            }
            Frame::Reply(reply) => {
                let body = match &reply.result {
                    Ok(payload) => {
                        buf.put_u8(KIND_REPLY_OK);
                        payload.clone()
                    }
                    Err(status) => {
                        buf.put_u8(KIND_REPLY_ERR);
                        Bytes::from(serde_json::to_vec(status)?)
                    }
                };
                buf.put_u64(reply.call_id);
                put_metadata(&mut buf, &reply.metadata)?;
                buf.put_slice(&body);
            }
        }
        Ok(buf.freeze())
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, FrameError> {
        need(&buf, 9, "header")?;
        let kind = buf.get_u8();
        let call_id = buf.get_u64();

        match kind {
            KIND_CALL => {
                let method = get_str16(&mut buf, "method")?;
                let metadata = get_metadata(&mut buf)?;
                Ok(Frame::Call(CallFrame {
                    call_id,
                    method,
                    metadata,
                    payload: buf,
                }))
            }
            KIND_REPLY_OK | KIND_REPLY_ERR => {
                let metadata = get_metadata(&mut buf)?;
                let result = if kind == KIND_REPLY_OK {
                    Ok(buf)
                } else {
                    Err(serde_json::from_slice::<Status>(&buf)?)
                };
                Ok(Frame::Reply(ReplyFrame {
                    call_id,
                    metadata,
                    result,
                }))
            }
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

fn need(buf: &Bytes, len: usize, what: &'static str) -> Result<(), FrameError> {
    if buf.remaining() < len {
        Err(FrameError::Truncated(what))
    } else {
        Ok(())
    }
}

fn put_str16(buf: &mut BytesMut, what: &'static str, value: &str) -> Result<(), FrameError> {
    let len = u16::try_from(value.len()).map_err(|_| FrameError::TooLong { what, len: value.len() })?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn get_str16(buf: &mut Bytes, what: &'static str) -> Result<String, FrameError> {
    need(buf, 2, what)?;
    let len = usize::from(buf.get_u16());
    get_utf8(buf, len, what)
}

fn get_utf8(buf: &mut Bytes, len: usize, what: &'static str) -> Result<String, FrameError> {
    need(buf, len, what)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| FrameError::InvalidUtf8(what))
}

fn put_metadata(buf: &mut BytesMut, metadata: &MetadataMap) -> Result<(), FrameError> {
    let entries: Vec<(&str, &String)> = metadata
        .iter()
        .flat_map(|(key, values)| values.iter().map(move |v| (key, v)))
        .collect();
    let count = u16::try_from(entries.len()).map_err(|_| FrameError::TooLong {
        what: "metadata",
        len: entries.len(),
    })?;

    buf.put_u16(count);
    for (key, value) in entries {
        put_str16(buf, "metadata key", key)?;
        let len = u32::try_from(value.len()).map_err(|_| FrameError::TooLong {
            what: "metadata value",
            len: value.len(),
        })?;
        buf.put_u32(len);
        buf.put_slice(value.as_bytes());
    }
    Ok(())
}

fn get_metadata(buf: &mut Bytes) -> Result<MetadataMap, FrameError> {
    need(buf, 2, "metadata")?;
    let count = buf.get_u16();
    let mut metadata = MetadataMap::new();
    for _ in 0..count {
        let key = get_str16(buf, "metadata key")?;
        need(buf, 4, "metadata value")?;
        let len = buf.get_u32() as usize;
        let value = get_utf8(buf, len, "metadata value")?;
        metadata.append(key, value);
    }
    Ok(metadata)
}
