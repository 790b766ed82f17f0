//! Retry link.

use async_trait::async_trait;
use serde_json::Value;

use super::{Link, Next};
use crate::client::{ClientError, Operation};
use crate::config::RetryConfig;
use crate::resilience::backoff::backoff_for;
use crate::resilience::{is_retryable_error, is_retryable_operation};

/// Re-sends retryable operations through the rest of the chain.
///
/// Mutations and form calls pass through untouched.
pub struct RetryLink {
    config: RetryConfig,
}

impl RetryLink {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Link for RetryLink {
    async fn call(&self, operation: Operation, next: Next<'_>) -> Result<Value, ClientError> {
        if !self.config.enabled || !is_retryable_operation(&operation) {
            return next.run(operation).await;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match next.run(operation.clone()).await {
                Err(err) if attempts < self.config.max_attempts && is_retryable_error(&err) => {
                    let delay = backoff_for(&self.config, attempts);
                    tracing::info!(
                        id = operation.id,
                        path = %operation.path,
                        attempt = attempts,
                        delay = ?delay,
                        error = %err,
                        "Retrying call"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FormPayload;
    use crate::links::{Chain, Link};
    use crate::protocol::ProcedureKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with `error` until the `succeed_on`-th call.
    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
        error: ClientError,
    }

    #[async_trait]
    impl Link for Flaky {
        async fn call(&self, _operation: Operation, _next: Next<'_>) -> Result<Value, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(json!(n))
            } else {
                Err(self.error.clone())
            }
        }
    }

    fn setup(succeed_on: u32, error: ClientError) -> (Chain, Arc<Flaky>) {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            succeed_on,
            error,
        });
        let config = RetryConfig {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let links: Vec<Arc<dyn Link>> = vec![Arc::new(RetryLink::new(config)), flaky.clone()];
        (Chain::new(links), flaky)
    }

    fn op(kind: ProcedureKind) -> Operation {
        Operation {
            id: 9,
            path: "users.get".into(),
            kind,
            input: json!({"name": "bob"}).into(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_query_failures() {
        let (chain, flaky) = setup(3, ClientError::Transport("connection reset".into()));
        assert_eq!(chain.execute(op(ProcedureKind::Query)).await.unwrap(), json!(3));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (chain, flaky) = setup(10, ClientError::Timeout);
        assert_eq!(chain.execute(op(ProcedureKind::Query)).await, Err(ClientError::Timeout));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_never_retries_mutations_or_forms() {
        let (chain, flaky) = setup(2, ClientError::Timeout);
        assert!(chain.execute(op(ProcedureKind::Mutation)).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);

        let (chain, flaky) = setup(2, ClientError::Timeout);
        let mut form = op(ProcedureKind::Query);
        form.input = FormPayload::new().text("name", "bob").into();
        assert!(chain.execute(form).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let (chain, flaky) = setup(
            2,
            ClientError::Rpc {
                code: crate::error::ErrorCode::NotFound,
                message: "User not found".into(),
                issues: vec![],
            },
        );
        assert!(chain.execute(op(ProcedureKind::Query)).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
