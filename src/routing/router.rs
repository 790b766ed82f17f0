//! Procedure registry and lookup.
//!
//! # Responsibilities
//! - Collect procedure definitions at construction time
//! - Look up a procedure by exact path
//! - Reject kind mismatches instead of falling back
//!
//! # Design Decisions
//! - Immutable after `build()` (shared via Arc without locks)
//! - O(1) lookup via HashMap
//! - Duplicate paths are a build error, not last-write-wins

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::error::RpcError;
use crate::protocol::ProcedureKind;
use crate::routing::procedure::{Context, Procedure};
use crate::validation::Validator;

/// Errors raised while building a router.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("Procedure path \"{0}\" is registered more than once")]
    DuplicatePath(String),

    #[error("Procedure path must not be empty")]
    EmptyPath,

    #[error("Procedure path \"{0}\" must not contain ',' or '/'")]
    InvalidPath(String),
}

/// Collects procedures, then freezes them into a [`Router`].
pub struct RouterBuilder<S> {
    procedures: Vec<Procedure<S>>,
}

impl<S: Send + Sync + 'static> RouterBuilder<S> {
    pub fn new() -> Self {
        Self {
            procedures: Vec::new(),
        }
    }

    pub fn procedure(mut self, procedure: Procedure<S>) -> Self {
        self.procedures.push(procedure);
        self
    }

    pub fn query<V, F, Fut, O>(self, path: &str, validator: V, callback: F) -> Self
    where
        V: Validator,
        F: Fn(Context<S>, V::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.procedure(Procedure::new(path, ProcedureKind::Query, validator, callback))
    }

    pub fn mutation<V, F, Fut, O>(self, path: &str, validator: V, callback: F) -> Self
    where
        V: Validator,
        F: Fn(Context<S>, V::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.procedure(Procedure::new(path, ProcedureKind::Mutation, validator, callback))
    }

    /// Mount every procedure of `other` under `prefix.`.
    pub fn nest(mut self, prefix: &str, other: RouterBuilder<S>) -> Self {
        for procedure in other.procedures {
            let path = format!("{}.{}", prefix, procedure.path());
            self.procedures.push(procedure.with_path(path));
        }
        self
    }

    pub fn build(self, state: S) -> Result<Router<S>, RouterError> {
        let mut procedures = HashMap::with_capacity(self.procedures.len());
        for procedure in self.procedures {
            let path = procedure.path().to_string();
            if path.is_empty() {
                return Err(RouterError::EmptyPath);
            }
            if !is_valid_path(&path) {
                return Err(RouterError::InvalidPath(path));
            }
            if procedures.contains_key(&path) {
                return Err(RouterError::DuplicatePath(path));
            }
            procedures.insert(path, procedure);
        }

        tracing::debug!(procedures = procedures.len(), "Router built");
        Ok(Router {
            procedures,
            state: Arc::new(state),
        })
    }
}

impl<S: Send + Sync + 'static> Default for RouterBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable procedure registry owning the server state.
pub struct Router<S> {
    procedures: HashMap<String, Procedure<S>>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Router<S> {
    pub fn builder() -> RouterBuilder<S> {
        RouterBuilder::new()
    }
}

impl<S> Router<S> {
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    /// Exact-path lookup; a kind mismatch is reported as NOT_FOUND.
    pub fn resolve(&self, path: &str, kind: ProcedureKind) -> Result<&Procedure<S>, RpcError> {
        let procedure = self
            .procedures
            .get(path)
            .ok_or_else(|| RpcError::not_found(format!("No procedure found on path \"{}\"", path)))?;

        if procedure.kind() != kind {
            return Err(RpcError::not_found(format!(
                "Procedure \"{}\" is a {}, not a {}",
                path,
                procedure.kind(),
                kind
            )));
        }
        Ok(procedure)
    }
}

impl<S> std::fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("procedures", &self.procedures.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Dot-separated segments of ASCII letters, digits, `_` and `-`.
///
/// These names travel in the URL path unescaped, so the server can match
/// them without percent-decoding. `,` is reserved for batch paths.
fn is_valid_path(path: &str) -> bool {
    path.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}
