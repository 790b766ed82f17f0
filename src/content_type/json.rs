//! JSON content-type handler.
//!
//! Claims `application/json` bodies and body-less GET queries. Single calls
//! carry `{"input": ..}`, batches carry an array of those, one per path.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Method;
use bytes::Bytes;

use crate::content_type::{
    media_type, query_param, CallTarget, ContentTypeHandler, DecodedCall, DecodedRequest,
    RequestHead,
};
use crate::error::RpcError;
use crate::input::RawInput;
use crate::protocol::{JsonCall, INPUT_PARAM};

const MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct JsonContentTypeHandler {
    max_body_size: usize,
}

impl JsonContentTypeHandler {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, RpcError> {
        axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                RpcError::payload_too_large(format!(
                    "Failed to read request body (limit {} bytes): {}",
                    self.max_body_size, e
                ))
            })
    }
}

impl Default for JsonContentTypeHandler {
    fn default() -> Self {
        Self::new(2 * 1024 * 1024)
    }
}

#[async_trait]
impl ContentTypeHandler for JsonContentTypeHandler {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_handle(&self, head: &RequestHead) -> bool {
        match media_type(head) {
            Some(media) => media == MEDIA_TYPE,
            None => head.method == Method::GET,
        }
    }

    async fn decode(&self, head: RequestHead, body: Body) -> Result<DecodedRequest, RpcError> {
        let target = CallTarget::from_head(&head)?;

        let raw: Option<Bytes> = if head.method == Method::GET {
            query_param(&head, INPUT_PARAM).map(Bytes::from)
        } else {
            let bytes = self.read_body(body).await?;
            (!bytes.is_empty()).then_some(bytes)
        };

        let inputs = match raw {
            None if target.batch => {
                return Err(RpcError::bad_request("Batch request is missing its input"))
            }
            None => vec![serde_json::Value::Null],
            Some(bytes) => parse_inputs(&bytes, &target)?,
        };

        let calls = target
            .paths
            .into_iter()
            .zip(inputs)
            .map(|(path, input)| DecodedCall {
                path,
                input: RawInput::Json(input),
            })
            .collect();

        Ok(DecodedRequest {
            kind: target.kind,
            batch: target.batch,
            calls,
        })
    }
}

fn parse_inputs(bytes: &[u8], target: &CallTarget) -> Result<Vec<serde_json::Value>, RpcError> {
    if target.batch {
        let calls: Vec<JsonCall> = serde_json::from_slice(bytes)
            .map_err(|e| RpcError::parse_error(format!("Malformed JSON batch body: {}", e)))?;
        if calls.len() != target.paths.len() {
            return Err(RpcError::bad_request(format!(
                "Batch has {} inputs for {} procedure paths",
                calls.len(),
                target.paths.len()
            )));
        }
        Ok(calls.into_iter().map(|c| c.input).collect())
    } else {
        let call: JsonCall = serde_json::from_slice(bytes)
            .map_err(|e| RpcError::parse_error(format!("Malformed JSON body: {}", e)))?;
        Ok(vec![call.input])
    }
}
