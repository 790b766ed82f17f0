//! Streamed file parts decoded from multipart bodies.
//!
//! # Design Decisions
//! - Decoding yields a handle; reading the bytes is a separate step
//! - The byte stream can be taken exactly once, even across clones
//! - A stream dropped half-way leaves the part consumed

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Stream of file bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, FileError>>;

/// Errors raised while reading a file part.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File part \"{0}\" has already been consumed")]
    AlreadyConsumed(String),

    #[error("I/O error while reading file part: {0}")]
    Io(#[from] std::io::Error),

    #[error("File part \"{0}\" is not valid UTF-8")]
    InvalidUtf8(String),
}

/// Where the bytes of a part live until someone drains them.
pub enum FileBody {
    /// Chunks as they arrived off the wire.
    Memory(VecDeque<Bytes>),
    /// Spooled to a temporary file, removed when dropped.
    Disk {
        file: tokio::fs::File,
        path: TempPath,
    },
}

impl FileBody {
    fn into_stream(self) -> ByteStream {
        match self {
            FileBody::Memory(chunks) => stream::iter(chunks.into_iter().map(Ok)).boxed(),
            FileBody::Disk { file, path } => {
                stream::try_unfold((file, path), |(mut file, path)| async move {
                    let mut buf = BytesMut::with_capacity(READ_CHUNK);
                    let read = file.read_buf(&mut buf).await?;
                    if read == 0 {
                        return Ok(None);
                    }
                    Ok::<_, FileError>(Some((buf.freeze(), (file, path))))
                })
                .boxed()
            }
        }
    }
}

struct Inner {
    field_name: String,
    filename: String,
    mime_type: String,
    size: u64,
    body: Mutex<Option<FileBody>>,
}

/// A named binary part with its filename and declared MIME type.
///
/// Cloning yields another handle to the same single-use stream.
#[derive(Clone)]
pub struct FilePart {
    inner: Arc<Inner>,
}

impl FilePart {
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        body: FileBody,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                field_name: field_name.into(),
                filename: filename.into(),
                mime_type: mime_type.into(),
                size,
                body: Mutex::new(Some(body)),
            }),
        }
    }

    /// Build an in-memory part from a complete byte buffer.
    pub fn from_bytes(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::new(
            field_name,
            filename,
            mime_type,
            size,
            FileBody::Memory(VecDeque::from([bytes])),
        )
    }

    pub fn field_name(&self) -> &str {
        &self.inner.field_name
    }

    pub fn filename(&self) -> &str {
        &self.inner.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    /// Number of bytes received for this part.
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    pub fn is_consumed(&self) -> bool {
        self.inner
            .body
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Take the byte stream. Fails if any handle already took it.
    pub fn stream(&self) -> Result<ByteStream, FileError> {
        let body = self
            .inner
            .body
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| FileError::AlreadyConsumed(self.inner.field_name.clone()))?;
        Ok(body.into_stream())
    }

    /// Drain the stream into memory.
    pub async fn bytes(&self) -> Result<Bytes, FileError> {
        let chunks: Vec<Bytes> = self.stream()?.try_collect().await?;
        if chunks.len() == 1 {
            return Ok(chunks.into_iter().next().unwrap_or_default());
        }
        let mut buf = BytesMut::with_capacity(self.inner.size as usize);
        for chunk in chunks {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Drain the stream and decode it as UTF-8.
    pub async fn text(&self) -> Result<String, FileError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FileError::InvalidUtf8(self.inner.field_name.clone()))
    }
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field_name", &self.inner.field_name)
            .field("filename", &self.inner.filename)
            .field("mime_type", &self.inner.mime_type)
            .field("size", &self.inner.size)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
