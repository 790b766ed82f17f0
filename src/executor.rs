//! Call execution: validate, invoke, wrap the outcome in an envelope.
//!
//! # Responsibilities
//! - Resolve the procedure for a decoded call
//! - Run the validator, then the callback, exactly once
//! - Convert every failure (including panics) into a failure envelope
//!
//! # Design Decisions
//! - Nothing thrown here crosses onto the wire as anything but an envelope
//! - No retries; retrying is a client link concern
//! - Panic payloads are logged, never serialized

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;

use crate::content_type::DecodedCall;
use crate::error::{ErrorCode, RpcError};
use crate::input::RawInput;
use crate::observability::metrics;
use crate::protocol::{ProcedureKind, ResultEnvelope};
use crate::routing::{CallFailure, Context, Procedure, Router};

/// Resolve and run one decoded call.
pub async fn execute<S>(
    router: &Router<S>,
    kind: ProcedureKind,
    call: DecodedCall,
    request_id: Option<String>,
) -> ResultEnvelope
where
    S: Send + Sync + 'static,
{
    let procedure = match router.resolve(&call.path, kind) {
        Ok(p) => p,
        Err(err) => {
            tracing::debug!(path = %call.path, kind = %kind, error = %err.message, "Procedure not resolved");
            metrics::record_call(metrics::UNRESOLVED_PATH, kind, Some(err.code), None);
            return ResultEnvelope::failure(err);
        }
    };

    let ctx = Context {
        state: router.state().clone(),
        path: call.path,
        kind,
        request_id,
    };
    run(procedure, ctx, call.input).await
}

/// Run a resolved procedure.
pub async fn run<S>(procedure: &Procedure<S>, ctx: Context<S>, input: RawInput) -> ResultEnvelope
where
    S: Send + Sync + 'static,
{
    let start = Instant::now();
    let path = ctx.path.clone();
    let kind = ctx.kind;
    let request_id = ctx.request_id.clone().unwrap_or_default();

    if kind == ProcedureKind::Subscription {
        let err = RpcError::new(
            ErrorCode::MethodNotSupported,
            "Subscriptions are not served over HTTP request/response",
        );
        metrics::record_call(&path, kind, Some(err.code), Some(start));
        return ResultEnvelope::failure(err);
    }

    let outcome = AssertUnwindSafe(procedure.handler().call(ctx, input))
        .catch_unwind()
        .await;

    let envelope = match outcome {
        Ok(Ok(data)) => {
            tracing::debug!(request_id = %request_id, path = %path, kind = %kind, "Procedure succeeded");
            ResultEnvelope::success(data)
        }
        Ok(Err(CallFailure::Validation(err))) => {
            tracing::debug!(request_id = %request_id, path = %path, error = %err, "Input validation failed");
            ResultEnvelope::failure(err.into())
        }
        Ok(Err(CallFailure::Application(err))) => {
            if err.code == ErrorCode::InternalServerError {
                tracing::error!(request_id = %request_id, path = %path, error = %err.message, "Procedure failed");
            } else {
                tracing::debug!(request_id = %request_id, path = %path, code = %err.code, error = %err.message, "Procedure returned an error");
            }
            ResultEnvelope::failure(err)
        }
        Ok(Err(CallFailure::Output(err))) => {
            tracing::error!(request_id = %request_id, path = %path, error = %err, "Failed to serialize procedure output");
            ResultEnvelope::failure(RpcError::internal("Failed to serialize procedure output"))
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(request_id = %request_id, path = %path, panic = %detail, "Procedure panicked");
            ResultEnvelope::failure(RpcError::internal("Internal server error"))
        }
    };

    metrics::record_call(&path, kind, envelope.error_code(), Some(start));
    envelope
}
