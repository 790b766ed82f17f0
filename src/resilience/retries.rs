//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether an operation may be sent more than once
//! - Decide whether a failure is worth another attempt
//!
//! # Design Decisions
//! - Only JSON queries are retryable operations
//! - Transport failures and timeouts are always retryable
//! - RPC failures are retryable only for transient codes

use crate::client::{ClientError, Operation};
use crate::error::ErrorCode;
use crate::protocol::ProcedureKind;

pub fn is_retryable_operation(operation: &Operation) -> bool {
    operation.kind == ProcedureKind::Query && !operation.input.is_form()
}

pub fn is_retryable_error(err: &ClientError) -> bool {
    match err {
        ClientError::Transport(_) | ClientError::Timeout => true,
        ClientError::Rpc { code, .. } => matches!(
            code,
            ErrorCode::Timeout | ErrorCode::TooManyRequests | ErrorCode::InternalServerError
        ),
        ClientError::Protocol(_) | ClientError::NoTerminalLink => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CallInput, FormPayload};
    use serde_json::json;

    fn op(kind: ProcedureKind, input: CallInput) -> Operation {
        Operation {
            id: 1,
            path: "users.get".into(),
            kind,
            input,
        }
    }

    #[test]
    fn test_only_json_queries_are_retryable() {
        assert!(is_retryable_operation(&op(ProcedureKind::Query, json!(1).into())));
        assert!(!is_retryable_operation(&op(ProcedureKind::Mutation, json!(1).into())));
        assert!(!is_retryable_operation(&op(
            ProcedureKind::Query,
            FormPayload::new().text("name", "bob").into()
        )));
    }

    #[test]
    fn test_error_classification() {
        let rpc = |code| ClientError::Rpc {
            code,
            message: String::new(),
            issues: vec![],
        };

        assert!(is_retryable_error(&ClientError::Transport("reset".into())));
        assert!(is_retryable_error(&ClientError::Timeout));
        assert!(is_retryable_error(&rpc(ErrorCode::TooManyRequests)));
        assert!(is_retryable_error(&rpc(ErrorCode::InternalServerError)));
        assert!(!is_retryable_error(&rpc(ErrorCode::NotFound)));
        assert!(!is_retryable_error(&rpc(ErrorCode::BadRequest)));
        assert!(!is_retryable_error(&ClientError::Protocol("html".into())));
    }
}
