//! Error taxonomy shared by the server pipeline and the wire format.
//!
//! Every failure inside decode, validation or execution is expressed as an
//! [`RpcError`] and is converted into a failure envelope before it reaches
//! the wire. The client maps those envelopes back into
//! [`crate::client::ClientError::Rpc`] with the same code.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error code carried in failure envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Body could not be parsed for the claimed content type.
    ParseError,
    /// Input was well-formed but rejected (validation, bad batch shape).
    BadRequest,
    Unauthorized,
    Forbidden,
    /// Unknown procedure path or procedure kind mismatch.
    NotFound,
    MethodNotSupported,
    Timeout,
    Conflict,
    PayloadTooLarge,
    /// No content-type handler claimed the request.
    UnsupportedMediaType,
    TooManyRequests,
    InternalServerError,
}

impl ErrorCode {
    /// HTTP status used when this code is the outcome of a single call.
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::ParseError | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire spelling of the code, e.g. `NOT_FOUND`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field name (dotted for nested JSON input), empty for the whole input.
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Input failed schema validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Input validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    /// Shorthand for a single failing field.
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(path, message)],
        }
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| {
            if i.path.is_empty() {
                i.message.clone()
            } else {
                format!("{}: {}", i.path, i.message)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error raised anywhere in the server pipeline.
///
/// Business-logic callbacks return this directly to signal typed
/// application failures such as `RpcError::not_found("User not found")`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    pub issues: Vec<FieldIssue>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unsupported_media_type(content_type: Option<&str>) -> Self {
        Self::new(
            ErrorCode::UnsupportedMediaType,
            match content_type {
                Some(ct) => format!("Unsupported content-type \"{}\"", ct),
                None => "Missing content-type".to_string(),
            },
        )
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }
}

impl From<ValidationError> for RpcError {
    fn from(err: ValidationError) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            message: err.to_string(),
            issues: err.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_spelling() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedMediaType).unwrap();
        assert_eq!(json, "\"UNSUPPORTED_MEDIA_TYPE\"");
        assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");

        let back: ErrorCode = serde_json::from_str("\"PAYLOAD_TOO_LARGE\"").unwrap();
        assert_eq!(back, ErrorCode::PayloadTooLarge);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::UnsupportedMediaType.http_status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(ErrorCode::ParseError.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_error_keeps_issues() {
        let err = ValidationError::new(vec![
            FieldIssue::new("age", "Expected a number"),
            FieldIssue::new("name", "Required"),
        ]);
        assert_eq!(
            err.to_string(),
            "Input validation failed: age: Expected a number, name: Required"
        );

        let rpc: RpcError = err.into();
        assert_eq!(rpc.code, ErrorCode::BadRequest);
        assert_eq!(rpc.issues.len(), 2);
    }
}
