//! Procedure definitions: a validator plus a business-logic callback.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{RpcError, ValidationError};
use crate::input::RawInput;
use crate::protocol::ProcedureKind;
use crate::validation::Validator;

/// Per-call context handed to callbacks.
pub struct Context<S> {
    /// Server-owned state, e.g. a record store.
    pub state: Arc<S>,
    pub path: String,
    pub kind: ProcedureKind,
    pub request_id: Option<String>,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            path: self.path.clone(),
            kind: self.kind,
            request_id: self.request_id.clone(),
        }
    }
}

/// Why a procedure call did not produce a value.
#[derive(Debug)]
pub enum CallFailure {
    /// The validator rejected the input.
    Validation(ValidationError),
    /// The callback returned an error.
    Application(RpcError),
    /// The callback's output could not be serialized.
    Output(serde_json::Error),
}

/// Type-erased validator + callback pair.
#[async_trait]
pub trait ErasedHandler<S>: Send + Sync {
    async fn call(&self, ctx: Context<S>, input: RawInput) -> Result<Value, CallFailure>;
}

struct Handler<V, F, O> {
    validator: V,
    callback: F,
    _marker: PhantomData<fn() -> O>,
}

#[async_trait]
impl<S, V, F, Fut, O> ErasedHandler<S> for Handler<V, F, O>
where
    S: Send + Sync + 'static,
    V: Validator,
    F: Fn(Context<S>, V::Output) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    O: Serialize + Send + 'static,
{
    async fn call(&self, ctx: Context<S>, input: RawInput) -> Result<Value, CallFailure> {
        let typed = self
            .validator
            .parse(input)
            .await
            .map_err(CallFailure::Validation)?;
        let output = (self.callback)(ctx, typed)
            .await
            .map_err(CallFailure::Application)?;
        serde_json::to_value(output).map_err(CallFailure::Output)
    }
}

/// A registered procedure. Immutable once the router is built.
pub struct Procedure<S> {
    path: String,
    kind: ProcedureKind,
    handler: Arc<dyn ErasedHandler<S>>,
}

impl<S: Send + Sync + 'static> Procedure<S> {
    pub fn new<V, F, Fut, O>(path: impl Into<String>, kind: ProcedureKind, validator: V, callback: F) -> Self
    where
        V: Validator,
        F: Fn(Context<S>, V::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize + Send + 'static,
    {
        Self {
            path: path.into(),
            kind,
            handler: Arc::new(Handler {
                validator,
                callback,
                _marker: PhantomData,
            }),
        }
    }
}

impl<S> Procedure<S> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub(crate) fn handler(&self) -> &dyn ErasedHandler<S> {
        self.handler.as_ref()
    }

    pub(crate) fn with_path(self, path: String) -> Self {
        Self { path, ..self }
    }
}

impl<S> std::fmt::Debug for Procedure<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}
