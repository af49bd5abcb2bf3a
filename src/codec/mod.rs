//! Request decoding and response encoding for the HTTP gateway.
//!
//! # Data Flow
//! ```text
//! blank request (JSON skeleton from Req::default())
//!     → json.rs      body → request field (if content-type is JSON)
//!     → multipart.rs form fields + files (if content-type is multipart)
//!     → query.rs     query string + urlencoded form → outer fields
//!     → path.rs      path variables → outer fields, required names checked
//!     → MethodHandler::decode_value (typed request)
//!
//! response message → field selection → decorators → json.rs encode
//! ```
//!
//! # Design Decisions
//! - Closed set of decoders run in an explicit priority list
//! - All decoders write the same value, so later sources override earlier ones
//! - Any failure aborts decoding with INVALID_ARGUMENT

pub mod json;
pub mod multipart;
pub mod path;
pub mod populate;
pub mod query;

use axum::http::{header, HeaderMap, HeaderValue};
use bytes::Bytes;
use serde_json::Value;

use crate::context::UploadTable;
use crate::errors::Status;
use crate::routing::RouteDescriptor;
use crate::service::Shape;

/// Everything a decoder may read from one request.
pub struct DecodeInput<'a> {
    pub headers: &'a HeaderMap,
    pub query: Option<&'a str>,
    pub body: &'a Bytes,
    pub route: &'a RouteDescriptor,
    pub vars: &'a [(String, String)],
    pub uploads: &'a UploadTable,
}

impl DecodeInput<'_> {
    /// Field types of the route's request message.
    pub fn shape(&self) -> &Shape {
        self.route.handler().request_shape()
    }
}

/// Lower-cased media type of the request, without parameters.
pub fn content_type_essence(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next()?.trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

/// One request data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Json,
    Multipart,
    Query,
    Path,
}

impl Decoder {
    /// Whether this source is present in the request.
    pub fn applies(&self, input: &DecodeInput<'_>) -> bool {
        match self {
            Decoder::Json => content_type_essence(input.headers).as_deref() == Some(json::CONTENT_TYPE),
            Decoder::Multipart => {
                content_type_essence(input.headers).as_deref() == Some(multipart::CONTENT_TYPE)
            }
            Decoder::Query | Decoder::Path => true,
        }
    }

    pub async fn decode(&self, input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
        match self {
            Decoder::Json => json::decode(input, target),
            Decoder::Multipart => multipart::decode(input, target).await,
            Decoder::Query => query::decode(input, target),
            Decoder::Path => path::decode(input, target),
        }
    }
}

/// Response encoding. JSON is the only format served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoder {
    #[default]
    Json,
}

impl Encoder {
    /// Content type and body for `value`.
    pub fn encode(&self, value: &Value) -> Result<(HeaderValue, Bytes), Status> {
        match self {
            Encoder::Json => json::encode(value),
        }
    }
}

/// Decoder priority list plus the response encoder.
#[derive(Debug, Clone)]
pub struct Codec {
    decoders: Vec<Decoder>,
    encoder: Encoder,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            decoders: vec![Decoder::Json, Decoder::Multipart, Decoder::Query, Decoder::Path],
            encoder: Encoder::Json,
        }
    }
}

impl Codec {
    /// A codec running `decoders` in the given order.
    pub fn new(decoders: Vec<Decoder>) -> Self {
        Self {
            decoders,
            encoder: Encoder::Json,
        }
    }

    pub fn decoders(&self) -> &[Decoder] {
        &self.decoders
    }

    pub fn encoder(&self) -> Encoder {
        self.encoder
    }

    /// Run every applicable decoder against `target`, stopping at the first error.
    pub async fn decode(&self, input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
        for decoder in &self.decoders {
            if decoder.applies(input) {
                decoder.decode(input, target).await?;
            }
        }
        Ok(())
    }

    pub fn encode(&self, value: &Value) -> Result<(HeaderValue, Bytes), Status> {
        self.encoder.encode(value)
    }
}
