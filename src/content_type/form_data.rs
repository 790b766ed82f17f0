//! Multipart form-data content-type handler.
//!
//! # Responsibilities
//! - Claim `multipart/form-data` requests
//! - Split the body into text fields and file parts, in submission order
//! - Hand file parts to the upload handler without draining them
//!
//! # Design Decisions
//! - Multipart calls are never batched
//! - Text fields are bounded by `max_text_field_size`
//! - File parts are bounded by the upload handler

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart};
use axum::http::{Request, StatusCode};
use futures_util::{StreamExt, TryStreamExt};

use crate::config::UploadConfig;
use crate::content_type::upload::{self, UploadHandler, UploadMeta};
use crate::content_type::{
    media_type, CallTarget, ContentTypeHandler, DecodedCall, DecodedRequest, RequestHead,
};
use crate::error::RpcError;
use crate::input::{FormData, FormValue, RawInput};

const MEDIA_TYPE: &str = "multipart/form-data";
const DEFAULT_FILE_MIME: &str = "application/octet-stream";

pub struct FormDataContentTypeHandler {
    upload: Arc<dyn UploadHandler>,
    max_text_field_size: usize,
}

impl FormDataContentTypeHandler {
    pub fn new(upload: Arc<dyn UploadHandler>, max_text_field_size: usize) -> Self {
        Self {
            upload,
            max_text_field_size,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(upload::from_config(config), config.max_text_field_size)
    }
}

impl Default for FormDataContentTypeHandler {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

fn multipart_error(err: MultipartError) -> RpcError {
    classify(err.status(), err.body_text())
}

fn multipart_rejection(err: MultipartRejection) -> RpcError {
    classify(err.status(), err.body_text())
}

/// Body-limit overruns surface as 413 from the multipart reader.
fn classify(status: StatusCode, detail: String) -> RpcError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        RpcError::payload_too_large(format!("Multipart body too large: {}", detail))
    } else {
        RpcError::parse_error(format!("Malformed multipart body: {}", detail))
    }
}

#[async_trait]
impl ContentTypeHandler for FormDataContentTypeHandler {
    fn name(&self) -> &'static str {
        "form-data"
    }

    fn can_handle(&self, head: &RequestHead) -> bool {
        media_type(head).as_deref() == Some(MEDIA_TYPE)
    }

    async fn decode(&self, head: RequestHead, body: Body) -> Result<DecodedRequest, RpcError> {
        let target = CallTarget::from_head(&head)?;
        if target.batch {
            return Err(RpcError::bad_request("Multipart requests cannot be batched"));
        }

        let mut multipart = Multipart::from_request(Request::from_parts(head, body), &())
            .await
            .map_err(multipart_rejection)?;

        let mut form = FormData::new();
        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field
                .name()
                .map(str::to_string)
                .ok_or_else(|| RpcError::bad_request("Multipart field without a name"))?;

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let meta = UploadMeta {
                        field_name: name.clone(),
                        filename,
                        mime_type: field
                            .content_type()
                            .unwrap_or(DEFAULT_FILE_MIME)
                            .to_string(),
                    };
                    let data = field.map_err(multipart_error).boxed();
                    let part = self.upload.store(meta, data).await?;
                    form.push(name, FormValue::File(part));
                }
                None => {
                    let mut buf = Vec::new();
                    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                        if buf.len() + chunk.len() > self.max_text_field_size {
                            return Err(RpcError::payload_too_large(format!(
                                "Field \"{}\" exceeds the {} byte limit",
                                name, self.max_text_field_size
                            )));
                        }
                        buf.extend_from_slice(&chunk);
                    }
                    let text = String::from_utf8(buf).map_err(|_| {
                        RpcError::parse_error(format!("Field \"{}\" is not valid UTF-8", name))
                    })?;
                    form.push(name, FormValue::Text(text));
                }
            }
        }

        tracing::debug!(fields = form.len(), "Decoded multipart body");
        let path = target.paths.into_iter().next().unwrap_or_default();
        Ok(DecodedRequest {
            kind: target.kind,
            batch: false,
            calls: vec![DecodedCall {
                path,
                input: RawInput::Form(form),
            }],
        })
    }
}
