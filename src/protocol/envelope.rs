//! Result envelopes: the only two shapes a call outcome takes on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, FieldIssue, RpcError};

/// Error body of a failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl From<RpcError> for ErrorShape {
    fn from(err: RpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            issues: err.issues,
        }
    }
}

/// `{ "ok": true, "data": .. }` or `{ "ok": false, "error": { code, message } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum ResultEnvelope {
    Success(Value),
    Failure(ErrorShape),
}

impl ResultEnvelope {
    pub fn success(data: Value) -> Self {
        ResultEnvelope::Success(data)
    }

    pub fn failure(err: RpcError) -> Self {
        ResultEnvelope::Failure(err.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResultEnvelope::Success(_))
    }

    /// Error code for failures, `None` for successes.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ResultEnvelope::Success(_) => None,
            ResultEnvelope::Failure(shape) => Some(shape.code),
        }
    }

    /// HTTP status for an envelope that is the sole outcome of a request.
    pub fn http_status(&self) -> axum::http::StatusCode {
        match self {
            ResultEnvelope::Success(_) => axum::http::StatusCode::OK,
            ResultEnvelope::Failure(shape) => shape.code.http_status(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorShape>,
}

impl TryFrom<RawEnvelope> for ResultEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.ok, raw.error) {
            (true, None) => Ok(ResultEnvelope::Success(raw.data.unwrap_or(Value::Null))),
            (false, Some(error)) => Ok(ResultEnvelope::Failure(error)),
            (true, Some(_)) => Err("success envelope must not carry an error".to_string()),
            (false, None) => Err("failure envelope is missing its error".to_string()),
        }
    }
}

impl From<ResultEnvelope> for RawEnvelope {
    fn from(envelope: ResultEnvelope) -> Self {
        match envelope {
            ResultEnvelope::Success(data) => RawEnvelope {
                ok: true,
                data: Some(data),
                error: None,
            },
            ResultEnvelope::Failure(error) => RawEnvelope {
                ok: false,
                data: None,
                error: Some(error),
            },
        }
    }
}
