//! Envelope encoding onto HTTP responses.
//!
//! # Responsibilities
//! - Serialize a single envelope with the status of its outcome
//! - Serialize batch envelopes in call order
//!
//! # Design Decisions
//! - A batch answers 200 when every call succeeded, 207 otherwise
//! - The body is always JSON, whichever content type the request used

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::RpcError;
use crate::protocol::ResultEnvelope;

/// Response for a single call.
pub fn single(envelope: ResultEnvelope) -> Response {
    (envelope.http_status(), Json(envelope)).into_response()
}

/// Response for a request that failed before any call ran.
pub fn failure(err: RpcError) -> Response {
    single(ResultEnvelope::failure(err))
}

/// Response for a batch; envelopes are in the order the calls were sent.
pub fn batch(envelopes: Vec<ResultEnvelope>) -> Response {
    (batch_status(&envelopes), Json(envelopes)).into_response()
}

pub fn batch_status(envelopes: &[ResultEnvelope]) -> StatusCode {
    if envelopes.iter().all(ResultEnvelope::is_ok) {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_status() {
        let ok = ResultEnvelope::success(json!(1));
        let failed = ResultEnvelope::failure(RpcError::not_found("nope"));

        assert_eq!(batch_status(&[ok.clone(), ok.clone()]), StatusCode::OK);
        assert_eq!(batch_status(&[ok, failed.clone()]), StatusCode::MULTI_STATUS);
        assert_eq!(batch_status(&[failed]), StatusCode::MULTI_STATUS);
    }

    #[test]
    fn test_single_uses_code_status() {
        let response = failure(RpcError::unsupported_media_type(Some("text/plain")));
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
