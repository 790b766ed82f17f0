//! Upload handlers: where file parts wait until a validator drains them.
//!
//! # Design Decisions
//! - Memory handler keeps chunks as received, bounded by `max_file_size`
//! - Disk handler spools to a temp file, holding one chunk in memory
//! - Exceeding the bound rejects the request with PAYLOAD_TOO_LARGE

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::config::UploadConfig;
use crate::content_type::file::{FileBody, FilePart};
use crate::error::RpcError;

/// Incoming chunks of one file part.
pub type ChunkStream<'a> = BoxStream<'a, Result<Bytes, RpcError>>;

/// Metadata of a file part, known before its bytes.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub field_name: String,
    pub filename: String,
    pub mime_type: String,
}

/// Stores the bytes of a file part for later, single-use reading.
#[async_trait]
pub trait UploadHandler: Send + Sync {
    async fn store(&self, meta: UploadMeta, data: ChunkStream<'_>) -> Result<FilePart, RpcError>;
}

/// Build the handler selected by configuration.
pub fn from_config(config: &UploadConfig) -> std::sync::Arc<dyn UploadHandler> {
    if config.spool_to_disk {
        std::sync::Arc::new(DiskUploadHandler::new(
            config.spool_dir.as_ref().map(PathBuf::from),
            config.max_file_size,
        ))
    } else {
        std::sync::Arc::new(MemoryUploadHandler::new(config.max_file_size))
    }
}

fn too_large(meta: &UploadMeta, limit: u64) -> RpcError {
    RpcError::payload_too_large(format!(
        "File \"{}\" exceeds the {} byte limit",
        meta.field_name, limit
    ))
}

fn spool_error(err: std::io::Error) -> RpcError {
    RpcError::internal(format!("Failed to spool file part: {}", err))
}

/// Keeps file parts in memory as the chunks arrived.
#[derive(Debug, Clone)]
pub struct MemoryUploadHandler {
    max_file_size: u64,
}

impl MemoryUploadHandler {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

#[async_trait]
impl UploadHandler for MemoryUploadHandler {
    async fn store(&self, meta: UploadMeta, mut data: ChunkStream<'_>) -> Result<FilePart, RpcError> {
        let mut chunks = VecDeque::new();
        let mut size: u64 = 0;

        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            if size > self.max_file_size {
                return Err(too_large(&meta, self.max_file_size));
            }
            chunks.push_back(chunk);
        }

        tracing::debug!(field = %meta.field_name, size, "Buffered file part in memory");
        Ok(FilePart::new(
            meta.field_name,
            meta.filename,
            meta.mime_type,
            size,
            FileBody::Memory(chunks),
        ))
    }
}

/// Spools file parts to temporary files.
#[derive(Debug, Clone)]
pub struct DiskUploadHandler {
    dir: Option<PathBuf>,
    max_file_size: u64,
}

impl DiskUploadHandler {
    /// `dir = None` uses the system temp directory.
    pub fn new(dir: Option<PathBuf>, max_file_size: u64) -> Self {
        Self { dir, max_file_size }
    }
}

#[async_trait]
impl UploadHandler for DiskUploadHandler {
    async fn store(&self, meta: UploadMeta, mut data: ChunkStream<'_>) -> Result<FilePart, RpcError> {
        let tmp = match &self.dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
        .map_err(|e| RpcError::internal(format!("Failed to create spool file: {}", e)))?;

        let (std_file, path) = tmp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);
        let mut size: u64 = 0;

        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            if size > self.max_file_size {
                return Err(too_large(&meta, self.max_file_size));
            }
            file.write_all(&chunk).await.map_err(spool_error)?;
        }

        file.flush().await.map_err(spool_error)?;
        file.rewind().await.map_err(spool_error)?;

        tracing::debug!(field = %meta.field_name, size, path = ?path, "Spooled file part to disk");
        Ok(FilePart::new(
            meta.field_name,
            meta.filename,
            meta.mime_type,
            size,
            FileBody::Disk { file, path },
        ))
    }
}
