//! Content-type negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → split into head + body
//!     → ContentTypeChain asks each handler `can_handle(head)`, in order
//!     → first claimer decodes the body (json.rs / form_data.rs)
//!     → DecodedRequest { kind, calls: [{ path, input }] }
//! ```
//!
//! # Design Decisions
//! - Claim decisions see only the request head, never the body
//! - Exactly one handler decodes a request; no fallback after a claim
//! - No claimer means UNSUPPORTED_MEDIA_TYPE without touching the body

pub mod file;
pub mod form_data;
pub mod json;
pub mod upload;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, request::Parts, Method, Request};

use crate::error::RpcError;
use crate::input::RawInput;
use crate::observability::metrics;
use crate::protocol::{self, ProcedureKind, BATCH_PARAM, KIND_HEADER};

pub use file::{FileError, FilePart};
pub use form_data::FormDataContentTypeHandler;
pub use json::JsonContentTypeHandler;
pub use upload::{DiskUploadHandler, MemoryUploadHandler, UploadHandler};

/// Request line and headers, without the body.
pub type RequestHead = Parts;

/// One decoded call.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    pub path: String,
    pub input: RawInput,
}

/// Output of a content-type handler.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub kind: ProcedureKind,
    pub batch: bool,
    pub calls: Vec<DecodedCall>,
}

/// Claims and decodes requests of one wire representation.
#[async_trait]
pub trait ContentTypeHandler: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Must be deterministic for a given head.
    fn can_handle(&self, head: &RequestHead) -> bool;

    async fn decode(&self, head: RequestHead, body: Body) -> Result<DecodedRequest, RpcError>;
}

/// Ordered list of content-type handlers; the first claimer wins.
#[derive(Clone)]
pub struct ContentTypeChain {
    handlers: Arc<[Arc<dyn ContentTypeHandler>]>,
}

impl ContentTypeChain {
    pub fn new(handlers: Vec<Arc<dyn ContentTypeHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// The handler that would decode a request with this head.
    pub fn claim(&self, head: &RequestHead) -> Option<&dyn ContentTypeHandler> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(head))
            .map(|h| h.as_ref())
    }

    pub async fn decode(&self, request: Request<Body>) -> Result<DecodedRequest, RpcError> {
        let (head, body) = request.into_parts();

        let Some(handler) = self.claim(&head) else {
            let content_type = content_type(&head);
            tracing::warn!(content_type = ?content_type, "No content-type handler claimed request");
            metrics::record_unsupported_media_type();
            return Err(RpcError::unsupported_media_type(content_type));
        };

        tracing::debug!(handler = handler.name(), path = %head.uri.path(), "Content-type handler claimed request");
        let name = handler.name();
        handler.decode(head, body).await.inspect_err(|e| {
            tracing::warn!(handler = name, code = %e.code, error = %e.message, "Failed to decode request");
            metrics::record_decode_failure(name);
        })
    }
}

impl std::fmt::Debug for ContentTypeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

/// Raw `content-type` header value, if present and valid.
pub fn content_type(head: &RequestHead) -> Option<&str> {
    head.headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Lowercased media type without parameters, e.g. `multipart/form-data`.
pub fn media_type(head: &RequestHead) -> Option<String> {
    content_type(head)
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
}

/// Procedure paths, kind and batch flag of a request, read from its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub paths: Vec<String>,
    pub kind: ProcedureKind,
    pub batch: bool,
}

impl CallTarget {
    pub fn from_head(head: &RequestHead) -> Result<Self, RpcError> {
        let paths = protocol::procedure_paths(head.uri.path());
        if paths.is_empty() {
            return Err(RpcError::not_found("No procedure path in request"));
        }

        let batch = query_param(head, BATCH_PARAM)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if !batch && paths.len() > 1 {
            return Err(RpcError::bad_request(
                "Multiple procedure paths require a batch request",
            ));
        }

        let kind = if head.method == Method::GET {
            ProcedureKind::Query
        } else if head.method == Method::POST {
            match head.headers.get(KIND_HEADER) {
                Some(value) => value
                    .to_str()
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| RpcError::bad_request(format!("Invalid {} header", KIND_HEADER)))?,
                None => ProcedureKind::Mutation,
            }
        } else {
            return Err(RpcError::new(
                crate::error::ErrorCode::MethodNotSupported,
                format!("Unsupported HTTP method {}", head.method),
            ));
        };

        Ok(Self { paths, kind, batch })
    }
}

/// First value of a query-string parameter, percent-decoded.
pub fn query_param(head: &RequestHead, name: &str) -> Option<String> {
    let query = head.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
