//! Logging link.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::{Link, Next};
use crate::client::{ClientError, Operation};

/// Logs each operation's start and outcome with elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerLink;

#[async_trait]
impl Link for LoggerLink {
    async fn call(&self, operation: Operation, next: Next<'_>) -> Result<Value, ClientError> {
        let start = Instant::now();
        let id = operation.id;
        let path = operation.path.clone();
        let kind = operation.kind;

        tracing::debug!(id, path = %path, kind = %kind, form = operation.input.is_form(), "Call started");
        let result = next.run(operation).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(id, path = %path, kind = %kind, elapsed_ms, "Call succeeded"),
            Err(err) => tracing::warn!(id, path = %path, kind = %kind, elapsed_ms, error = %err, "Call failed"),
        }
        result
    }
}
