//! Wire protocol shared by the client links and the server pipeline.
//!
//! # Request layout
//! ```text
//! single:   POST /{path}            body {"input": ..}        x-rpc-kind: mutation
//!           GET  /{path}?input=..   (queries only)
//! batch:    POST /{a},{b}?batch=1   body [{"input": ..}, {"input": ..}]
//! form:     POST /{path}            multipart/form-data       x-rpc-kind: ..
//! ```
//!
//! Responses are a [`ResultEnvelope`], or an array of envelopes for batches.

pub mod envelope;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use envelope::{ErrorShape, ResultEnvelope};

/// Header carrying the procedure kind on POST requests.
pub const KIND_HEADER: &str = "x-rpc-kind";

/// Query parameter flagging a batched request.
pub const BATCH_PARAM: &str = "batch";

/// Query parameter carrying the JSON input of GET queries.
pub const INPUT_PARAM: &str = "input";

/// Kind of a procedure; fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
    Subscription,
}

impl ProcedureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
            ProcedureKind::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcedureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(ProcedureKind::Query),
            "mutation" => Ok(ProcedureKind::Mutation),
            "subscription" => Ok(ProcedureKind::Subscription),
            other => Err(format!("unknown procedure kind \"{}\"", other)),
        }
    }
}

/// One call inside a JSON request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCall {
    #[serde(default)]
    pub input: Value,
}

/// Split a URL path into the procedure paths it addresses.
///
/// `/users.get,users.list` addresses two procedures; empty segments are
/// dropped.
pub fn procedure_paths(url_path: &str) -> Vec<String> {
    url_path
        .trim_start_matches('/')
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_paths() {
        assert_eq!(procedure_paths("/getUser"), vec!["getUser"]);
        assert_eq!(
            procedure_paths("/users.get,users.list"),
            vec!["users.get", "users.list"]
        );
        assert!(procedure_paths("/").is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Query".parse::<ProcedureKind>(), Ok(ProcedureKind::Query));
        assert_eq!(
            " mutation ".parse::<ProcedureKind>(),
            Ok(ProcedureKind::Mutation)
        );
        assert!("delete".parse::<ProcedureKind>().is_err());
    }

    #[test]
    fn test_json_call_defaults_missing_input_to_null() {
        let call: JsonCall = serde_json::from_str("{}").unwrap();
        assert_eq!(call.input, Value::Null);
    }
}
