//! HTTP exchange primitive used by terminal links.
//!
//! Terminal links describe a request as an [`HttpRequest`] and hand it to an
//! [`HttpTransport`]. [`ReqwestTransport`] is the production transport; tests
//! can substitute an in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart;
use serde_json::Value;
use url::Url;

use super::{ClientError, FormPart, FormPayload};
use crate::protocol::{ResultEnvelope, KIND_HEADER};

pub use reqwest::Method;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(FormPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, body: RequestBody) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn kind_header(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(KIND_HEADER))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode a single envelope body.
    pub fn into_result(self) -> Result<Value, ClientError> {
        match serde_json::from_slice::<ResultEnvelope>(&self.body) {
            Ok(ResultEnvelope::Success(data)) => Ok(data),
            Ok(ResultEnvelope::Failure(shape)) => Err(shape.into()),
            Err(e) => Err(self.protocol_error(e)),
        }
    }

    /// Decode a batch body into one result per call.
    ///
    /// A single failure envelope in place of the array means the whole batch
    /// was rejected; every call receives that failure.
    pub fn into_batch_results(self, expected: usize) -> Vec<Result<Value, ClientError>> {
        if let Ok(envelopes) = serde_json::from_slice::<Vec<ResultEnvelope>>(&self.body) {
            if envelopes.len() != expected {
                let err = ClientError::Protocol(format!(
                    "Batch response has {} results for {} calls",
                    envelopes.len(),
                    expected
                ));
                return vec![Err(err); expected];
            }
            return envelopes
                .into_iter()
                .map(|envelope| match envelope {
                    ResultEnvelope::Success(data) => Ok(data),
                    ResultEnvelope::Failure(shape) => Err(shape.into()),
                })
                .collect();
        }

        let shared = match self.into_result() {
            Ok(_) => ClientError::Protocol("Batch response was a single success envelope".to_string()),
            Err(err) => err,
        };
        vec![Err(shared); expected]
    }

    fn protocol_error(&self, err: serde_json::Error) -> ClientError {
        ClientError::Protocol(format!(
            "Unexpected response (status {}): {}",
            self.status, err
        ))
    }
}

/// Pluggable `send(request) -> response` primitive.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// Transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(err.to_string())
    }
}

fn multipart_form(payload: FormPayload) -> Result<multipart::Form, ClientError> {
    let mut form = multipart::Form::new();
    for (name, part) in payload.parts {
        form = match part {
            FormPart::Text(value) => form.text(name, value),
            FormPart::File {
                filename,
                mime_type,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes.to_vec())
                    .file_name(filename)
                    .mime_str(&mime_type)
                    .map_err(|e| ClientError::Protocol(format!("Invalid MIME type \"{}\": {}", mime_type, e)))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(payload) => builder.multipart(multipart_form(payload)?),
        };

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_single_envelope() {
        let ok = response(200, json!({"ok": true, "data": {"id": 7}}));
        assert_eq!(ok.into_result().unwrap(), json!({"id": 7}));

        let failed = response(404, json!({"ok": false, "error": {"code": "NOT_FOUND", "message": "gone"}}));
        assert_eq!(failed.into_result().unwrap_err().code(), Some(ErrorCode::NotFound));

        let garbage = HttpResponse {
            status: 502,
            body: Bytes::from_static(b"<html>bad gateway</html>"),
        };
        assert!(matches!(garbage.into_result(), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_batch_envelopes() {
        let mixed = response(
            207,
            json!([
                {"ok": true, "data": 1},
                {"ok": false, "error": {"code": "BAD_REQUEST", "message": "no"}}
            ]),
        );
        let results = mixed.into_batch_results(2);
        assert_eq!(results[0], Ok(json!(1)));
        assert_eq!(results[1].as_ref().unwrap_err().code(), Some(ErrorCode::BadRequest));

        let short = response(200, json!([{"ok": true, "data": 1}]));
        assert!(short
            .into_batch_results(2)
            .iter()
            .all(|r| matches!(r, Err(ClientError::Protocol(_)))));

        let rejected = response(400, json!({"ok": false, "error": {"code": "PARSE_ERROR", "message": "bad"}}));
        let results = rejected.into_batch_results(3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.as_ref().unwrap_err().code() == Some(ErrorCode::ParseError)));
    }
}
