//! Validator adapters.
//!
//! A [`Validator`] turns a decoded [`RawInput`] into the typed input of a
//! procedure, or fails with a [`ValidationError`] listing field problems.
//! Validation may be asynchronous, e.g. draining a file part into memory.
//!
//! # Adapters
//! - [`SerdeValidator`]: deserialize into any `DeserializeOwned` type
//! - [`FormSchema`]: form-field rules (text, numeric, checkbox, files)
//! - [`validator_fn`] / [`sync_validator_fn`]: wrap arbitrary closures
//! - [`Passthrough`]: hand the raw input to the procedure untouched

pub mod form;

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationError};
use crate::input::{FormValue, RawInput};

pub use form::{Blob, FieldValue, FormObject, FormSchema};

#[async_trait]
pub trait Validator: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn parse(&self, input: RawInput) -> Result<Self::Output, ValidationError>;

    /// Post-process the validated value.
    fn map<F, U>(self, f: F) -> Mapped<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Output) -> U + Send + Sync + 'static,
        U: Send + 'static,
    {
        Mapped { inner: self, f }
    }
}

/// Validator produced by [`Validator::map`].
pub struct Mapped<V, F> {
    inner: V,
    f: F,
}

#[async_trait]
impl<V, F, U> Validator for Mapped<V, F>
where
    V: Validator,
    F: Fn(V::Output) -> U + Send + Sync + 'static,
    U: Send + 'static,
{
    type Output = U;

    async fn parse(&self, input: RawInput) -> Result<U, ValidationError> {
        let value = self.inner.parse(input).await?;
        Ok((self.f)(value))
    }
}

/// Accepts any input and hands it over as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Validator for Passthrough {
    type Output = RawInput;

    async fn parse(&self, input: RawInput) -> Result<RawInput, ValidationError> {
        Ok(input)
    }
}

/// Deserializes the input into `T`.
///
/// Form inputs are viewed as a JSON object of their text fields; a repeated
/// field becomes an array. File parts are rejected.
pub struct SerdeValidator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeValidator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Validator for SerdeValidator<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    async fn parse(&self, input: RawInput) -> Result<T, ValidationError> {
        let value = match input {
            RawInput::Json(value) => value,
            RawInput::Form(form) => {
                let mut object = Map::new();
                let mut issues = Vec::new();
                for (name, value) in form.iter() {
                    let FormValue::Text(text) = value else {
                        issues.push(FieldIssue::new(name, "File uploads are not accepted"));
                        continue;
                    };
                    match object.get_mut(name) {
                        Some(Value::Array(items)) => items.push(Value::String(text.clone())),
                        Some(existing) => {
                            let first = existing.take();
                            *existing = Value::Array(vec![first, Value::String(text.clone())]);
                        }
                        None => {
                            object.insert(name.to_string(), Value::String(text.clone()));
                        }
                    }
                }
                if !issues.is_empty() {
                    return Err(ValidationError::new(issues));
                }
                Value::Object(object)
            }
        };
        deserialize_value(value)
    }
}

/// Deserialize `value`, reporting serde's message as a whole-input issue.
pub fn deserialize_value<T: DeserializeOwned>(value: Value) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::field("", e.to_string()))
}

/// Wraps an async closure.
pub struct FnValidator<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Build a validator from an async closure.
pub fn validator_fn<F, Fut, T>(f: F) -> FnValidator<F, T>
where
    F: Fn(RawInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
    T: Send + 'static,
{
    FnValidator {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> Validator for FnValidator<F, T>
where
    F: Fn(RawInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn parse(&self, input: RawInput) -> Result<T, ValidationError> {
        (self.f)(input).await
    }
}

/// Wraps a synchronous closure.
pub struct SyncFnValidator<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Build a validator from a plain closure.
pub fn sync_validator_fn<F, T>(f: F) -> SyncFnValidator<F, T>
where
    F: Fn(RawInput) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    SyncFnValidator {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, T> Validator for SyncFnValidator<F, T>
where
    F: Fn(RawInput) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn parse(&self, input: RawInput) -> Result<T, ValidationError> {
        (self.f)(input)
    }
}
