//! Client side of the RPC layer.
//!
//! # Data Flow
//! ```text
//! Client::query / Client::mutation
//!     → Operation { id, path, kind, input }
//!     → link chain (logger → retry → split)
//!     → terminal link (JSON or multipart) → HttpTransport::send
//!     → envelope decoded into Value or ClientError
//! ```
//!
//! # Design Decisions
//! - Every call is described by one immutable `Operation`
//! - The input variant alone decides the wire encoding
//! - Failure envelopes keep their code as `ClientError::Rpc`

pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ErrorCode, FieldIssue};
use crate::links::{self, Chain};
use crate::protocol::{ErrorShape, ProcedureKind};

pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody};

/// Errors surfaced to client callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The HTTP exchange itself failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a failure envelope.
    #[error("{code}: {message}")]
    Rpc {
        code: ErrorCode,
        message: String,
        issues: Vec<FieldIssue>,
    },

    /// The server answered with something that is not an envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request timed out")]
    Timeout,

    /// The chain ran out of links before one answered.
    #[error("Link chain has no terminal link")]
    NoTerminalLink,
}

impl ClientError {
    /// Wire code for RPC failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<ErrorShape> for ClientError {
    fn from(shape: ErrorShape) -> Self {
        ClientError::Rpc {
            code: shape.code,
            message: shape.message,
            issues: shape.issues,
        }
    }
}

/// One part of a client-side multipart payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text(String),
    File {
        filename: String,
        mime_type: String,
        bytes: Bytes,
    },
}

/// Form-shaped call input, sent as `multipart/form-data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPayload {
    parts: Vec<(String, FormPart)>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormPart::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormPart::File {
                filename: filename.into(),
                mime_type: mime_type.into(),
                bytes: bytes.into(),
            },
        ));
        self
    }

    pub fn parts(&self) -> &[(String, FormPart)] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Input of an outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallInput {
    Json(Value),
    Form(FormPayload),
}

impl CallInput {
    pub fn is_form(&self) -> bool {
        matches!(self, CallInput::Form(_))
    }
}

impl From<Value> for CallInput {
    fn from(value: Value) -> Self {
        CallInput::Json(value)
    }
}

impl From<FormPayload> for CallInput {
    fn from(form: FormPayload) -> Self {
        CallInput::Form(form)
    }
}

/// Descriptor of one outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: u64,
    pub path: String,
    pub kind: ProcedureKind,
    pub input: CallInput,
}

/// RPC client bound to one link chain.
pub struct Client {
    chain: Chain,
    next_id: AtomicU64,
}

impl Client {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            next_id: AtomicU64::new(1),
        }
    }

    /// Client with the stock chain over the reqwest transport.
    pub fn from_config(config: &ClientConfig, retries: &RetryConfig) -> Result<Self, ClientError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let chain = links::default_chain(config, retries, transport)?;
        Ok(Self::new(chain))
    }

    pub async fn call(
        &self,
        path: &str,
        kind: ProcedureKind,
        input: impl Into<CallInput>,
    ) -> Result<Value, ClientError> {
        let operation = Operation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: path.to_string(),
            kind,
            input: input.into(),
        };
        self.chain.execute(operation).await
    }

    pub async fn query(&self, path: &str, input: impl Into<CallInput>) -> Result<Value, ClientError> {
        self.call(path, ProcedureKind::Query, input).await
    }

    pub async fn mutation(&self, path: &str, input: impl Into<CallInput>) -> Result<Value, ClientError> {
        self.call(path, ProcedureKind::Mutation, input).await
    }

    /// Query and deserialize `data` into `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        path: &str,
        input: impl Into<CallInput>,
    ) -> Result<T, ClientError> {
        typed(self.query(path, input).await?)
    }

    /// Mutation and deserialize `data` into `T`.
    pub async fn mutation_as<T: DeserializeOwned>(
        &self,
        path: &str,
        input: impl Into<CallInput>,
    ) -> Result<T, ClientError> {
        typed(self.mutation(path, input).await?)
    }
}

fn typed<T: DeserializeOwned>(data: Value) -> Result<T, ClientError> {
    serde_json::from_value(data)
        .map_err(|e| ClientError::Protocol(format!("Response data has unexpected shape: {}", e)))
}
