//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the RPC
//! server and client. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RpcConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Multipart upload limits and spooling.
    pub uploads: UploadConfig,

    /// Client link settings.
    pub client: ClientConfig,

    /// Client-side retry settings.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes, any content type.
    pub max_body_size: usize,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 16 * 1024 * 1024, // 16MB
            max_connections: 10_000,
        }
    }
}

/// Multipart upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum size of a single file part in bytes.
    pub max_file_size: u64,

    /// Maximum size of a single text field in bytes.
    pub max_text_field_size: usize,

    /// Spool file parts to temporary files instead of memory.
    pub spool_to_disk: bool,

    /// Directory for spooled parts (system temp dir when unset).
    pub spool_dir: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_text_field_size: 64 * 1024,
            spool_to_disk: false,
            spool_dir: None,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the RPC server.
    pub url: String,

    /// Coalesce JSON calls into batches.
    pub batching: bool,

    /// How long to wait for more calls before flushing a batch, in milliseconds.
    pub batch_window_ms: u64,

    /// Maximum calls per batch.
    pub max_batch_size: usize,

    /// Send JSON queries as GET requests.
    pub get_for_queries: bool,

    /// Per-exchange timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            batching: true,
            batch_window_ms: 0,
            max_batch_size: 32,
            get_for_queries: true,
            request_timeout_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
