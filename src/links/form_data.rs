//! Multipart terminal link.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::http::procedure_url;
use super::{Link, Next};
use crate::client::transport::Method;
use crate::client::{CallInput, ClientError, HttpRequest, HttpTransport, Operation, RequestBody};
use crate::observability::metrics;
use crate::protocol::KIND_HEADER;

/// Sends form input as a single, never batched, multipart POST.
pub struct FormDataLink {
    base: Url,
    transport: Arc<dyn HttpTransport>,
}

impl FormDataLink {
    pub fn new(base: Url, transport: Arc<dyn HttpTransport>) -> Self {
        Self { base, transport }
    }
}

#[async_trait]
impl Link for FormDataLink {
    async fn call(&self, operation: Operation, _next: Next<'_>) -> Result<Value, ClientError> {
        let CallInput::Form(payload) = operation.input else {
            return Err(ClientError::Protocol(
                "The form_data link only encodes form input".to_string(),
            ));
        };
        metrics::record_client_dispatch("form_data");

        let request = HttpRequest::new(
            Method::POST,
            procedure_url(&self.base, &operation.path),
            RequestBody::Multipart(payload),
        )
        .header(KIND_HEADER, operation.kind.as_str());
        self.transport.send(request).await?.into_result()
    }
}
