//! Branching link.

use async_trait::async_trait;
use serde_json::Value;

use super::{Chain, Link, Next};
use crate::client::{ClientError, Operation};

type Predicate = dyn Fn(&Operation) -> bool + Send + Sync;

/// Routes each operation to exactly one of two sub-chains.
///
/// The predicate is evaluated once per call. There is no fallback between
/// branches, and links placed after a split are never reached.
pub struct SplitLink {
    predicate: Box<Predicate>,
    when_true: Chain,
    when_false: Chain,
}

impl SplitLink {
    pub fn new(
        predicate: impl Fn(&Operation) -> bool + Send + Sync + 'static,
        when_true: Chain,
        when_false: Chain,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            when_true,
            when_false,
        }
    }
}

/// True when the operation carries multipart form input.
pub fn is_form_payload(operation: &Operation) -> bool {
    operation.input.is_form()
}

#[async_trait]
impl Link for SplitLink {
    async fn call(&self, operation: Operation, _next: Next<'_>) -> Result<Value, ClientError> {
        let branch = if (self.predicate)(&operation) {
            &self.when_true
        } else {
            &self.when_false
        };
        branch.execute(operation).await
    }
}
