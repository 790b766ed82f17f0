//! Form-field validation rules.
//!
//! A [`FormSchema`] lists the expected fields of a form-shaped input and how
//! each one is coerced: text stays text, numeric text becomes a number,
//! checkboxes become booleans, and file fields either stay unread handles
//! (`file`) or are drained into memory (`blob`). JSON objects are accepted
//! too, with the same coercions.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::content_type::FilePart;
use crate::error::{FieldIssue, ValidationError};
use crate::input::{FormData, FormValue, RawInput};
use crate::validation::{deserialize_value, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Numeric,
    Checkbox,
    Repeated,
    File,
    Blob,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    name: String,
    kind: FieldKind,
    optional: bool,
}

/// A drained file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Form field the file was submitted under.
    pub field_name: String,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Blob {
    pub fn text(&self) -> Result<String, ValidationError> {
        String::from_utf8(self.bytes.to_vec())
            .map_err(|_| ValidationError::field(self.field_name.clone(), "File is not valid UTF-8"))
    }
}

/// A validated field value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Number(Number),
    Bool(bool),
    List(Vec<String>),
    File(FilePart),
    Blob(Blob),
}

/// Builder-style schema for form inputs.
#[derive(Debug, Clone, Default)]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            optional: kind == FieldKind::Checkbox || kind == FieldKind::Repeated,
        });
        self
    }

    /// Non-empty text.
    pub fn text(self, name: &str) -> Self {
        self.field(name, FieldKind::Text)
    }

    /// Text coerced to a number.
    pub fn numeric(self, name: &str) -> Self {
        self.field(name, FieldKind::Numeric)
    }

    /// `"on"` / `"true"` → true, absent → false.
    pub fn checkbox(self, name: &str) -> Self {
        self.field(name, FieldKind::Checkbox)
    }

    /// Every value of a repeated text field.
    pub fn repeated(self, name: &str) -> Self {
        self.field(name, FieldKind::Repeated)
    }

    /// A file part left unread; only its metadata is inspected.
    pub fn file(self, name: &str) -> Self {
        self.field(name, FieldKind::File)
    }

    /// A file part drained into memory during validation.
    pub fn blob(self, name: &str) -> Self {
        self.field(name, FieldKind::Blob)
    }

    /// Make the most recently added field optional.
    pub fn optional(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.optional = true;
        }
        self
    }

    /// Validate, then deserialize the non-file fields into `T`.
    pub fn typed<T>(self) -> TypedForm<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        TypedForm {
            schema: self,
            _marker: PhantomData,
        }
    }

    async fn validate(&self, input: RawInput) -> Result<FormObject, ValidationError> {
        let mut values = BTreeMap::new();
        let mut issues = Vec::new();
        let mut to_drain = Vec::new();

        let source = Source::new(input);
        for rule in &self.fields {
            match coerce(rule, &source) {
                Ok(Some(Pending::Ready(value))) => {
                    values.insert(rule.name.clone(), value);
                }
                Ok(Some(Pending::Drain(part))) => to_drain.push((rule.name.clone(), part)),
                Ok(None) if rule.optional => {}
                Ok(None) => issues.push(FieldIssue::new(&rule.name, "Required")),
                Err(message) => issues.push(FieldIssue::new(&rule.name, message)),
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }

        for (name, part) in to_drain {
            let bytes = part
                .bytes()
                .await
                .map_err(|e| ValidationError::field(name.clone(), e.to_string()))?;
            values.insert(
                name.clone(),
                FieldValue::Blob(Blob {
                    field_name: name,
                    filename: part.filename().to_string(),
                    mime_type: part.mime_type().to_string(),
                    bytes,
                }),
            );
        }

        Ok(FormObject { values })
    }
}

#[async_trait]
impl Validator for FormSchema {
    type Output = FormObject;

    async fn parse(&self, input: RawInput) -> Result<FormObject, ValidationError> {
        self.validate(input).await
    }
}

/// Validator produced by [`FormSchema::typed`].
pub struct TypedForm<T> {
    schema: FormSchema,
    _marker: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> Validator for TypedForm<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    async fn parse(&self, input: RawInput) -> Result<T, ValidationError> {
        let object = self.schema.validate(input).await?;
        object.deserialize()
    }
}

/// Validated form fields, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FormObject {
    values: BTreeMap<String, FieldValue>,
}

impl FormObject {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<&Number> {
        match self.values.get(name) {
            Some(FieldValue::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Bool(true)))
    }

    pub fn list(&self, name: &str) -> &[String] {
        match self.values.get(name) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        match self.values.get(name) {
            Some(FieldValue::File(f)) => Some(f),
            _ => None,
        }
    }

    pub fn blob(&self, name: &str) -> Option<&Blob> {
        match self.values.get(name) {
            Some(FieldValue::Blob(b)) => Some(b),
            _ => None,
        }
    }

    /// JSON view of the scalar fields; files and blobs are left out.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.values {
            let json = match value {
                FieldValue::Text(t) => Value::String(t.clone()),
                FieldValue::Number(n) => Value::Number(n.clone()),
                FieldValue::Bool(b) => Value::Bool(*b),
                FieldValue::List(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
                FieldValue::File(_) | FieldValue::Blob(_) => continue,
            };
            object.insert(name.clone(), json);
        }
        Value::Object(object)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        deserialize_value(self.to_json())
    }
}

enum Pending {
    Ready(FieldValue),
    Drain(FilePart),
}

/// Uniform read access over form and JSON inputs.
enum Source {
    Form(FormData),
    Json(Map<String, Value>),
    Invalid,
}

impl Source {
    fn new(input: RawInput) -> Self {
        match input {
            RawInput::Form(form) => Source::Form(form),
            RawInput::Json(Value::Object(map)) => Source::Json(map),
            RawInput::Json(Value::Null) => Source::Json(Map::new()),
            RawInput::Json(_) => Source::Invalid,
        }
    }
}

fn parse_number(text: &str) -> Result<Number, String> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("Expected a number, got \"{}\"", text))
}

fn parse_flag(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" | "" => Ok(false),
        other => Err(format!("Expected a checkbox value, got \"{}\"", other)),
    }
}

fn coerce(rule: &FieldSpec, source: &Source) -> Result<Option<Pending>, String> {
    match source {
        Source::Invalid => Err("Expected an object or form input".to_string()),
        Source::Form(form) => coerce_form(rule, form),
        Source::Json(map) => coerce_json(rule, map),
    }
}

fn coerce_form(rule: &FieldSpec, form: &FormData) -> Result<Option<Pending>, String> {
    if rule.kind == FieldKind::Repeated {
        let items = form
            .get_all(&rule.name)
            .map(|v| v.as_text().map(str::to_string).ok_or("Expected text, got a file"))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(Pending::Ready(FieldValue::List(items))));
    }

    let Some(value) = form.get(&rule.name) else {
        return match rule.kind {
            FieldKind::Checkbox => Ok(Some(Pending::Ready(FieldValue::Bool(false)))),
            _ => Ok(None),
        };
    };

    match (rule.kind, value) {
        (FieldKind::File, FormValue::File(part)) => Ok(Some(Pending::Ready(FieldValue::File(part.clone())))),
        (FieldKind::Blob, FormValue::File(part)) => Ok(Some(Pending::Drain(part.clone()))),
        (FieldKind::File | FieldKind::Blob, FormValue::Text(_)) => Err("Expected a file".to_string()),
        (_, FormValue::File(_)) => Err("Expected text, got a file".to_string()),
        (kind, FormValue::Text(text)) => coerce_text(kind, text),
    }
}

fn coerce_text(kind: FieldKind, text: &str) -> Result<Option<Pending>, String> {
    let value = match kind {
        FieldKind::Text if text.is_empty() => return Ok(None),
        FieldKind::Text => FieldValue::Text(text.to_string()),
        FieldKind::Numeric if text.trim().is_empty() => return Ok(None),
        FieldKind::Numeric => FieldValue::Number(parse_number(text)?),
        FieldKind::Checkbox => FieldValue::Bool(parse_flag(text)?),
        FieldKind::Repeated => FieldValue::List(vec![text.to_string()]),
        FieldKind::File | FieldKind::Blob => return Err("Expected a file".to_string()),
    };
    Ok(Some(Pending::Ready(value)))
}

fn coerce_json(rule: &FieldSpec, map: &Map<String, Value>) -> Result<Option<Pending>, String> {
    let value = match map.get(&rule.name) {
        None | Some(Value::Null) => {
            return match rule.kind {
                FieldKind::Checkbox => Ok(Some(Pending::Ready(FieldValue::Bool(false)))),
                FieldKind::Repeated => Ok(Some(Pending::Ready(FieldValue::List(Vec::new())))),
                _ => Ok(None),
            }
        }
        Some(v) => v,
    };

    match (rule.kind, value) {
        (FieldKind::File | FieldKind::Blob, _) => Err("Expected a file".to_string()),
        (FieldKind::Numeric, Value::Number(n)) => Ok(Some(Pending::Ready(FieldValue::Number(n.clone())))),
        (FieldKind::Checkbox, Value::Bool(b)) => Ok(Some(Pending::Ready(FieldValue::Bool(*b)))),
        (FieldKind::Repeated, Value::Array(items)) => {
            let items = items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or("Expected an array of strings"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Pending::Ready(FieldValue::List(items))))
        }
        (kind, Value::String(text)) => coerce_text(kind, text),
        (_, other) => Err(format!("Unexpected value {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    fn form(fields: &[(&str, &str)]) -> RawInput {
        let mut form = FormData::new();
        for (k, v) in fields {
            form.push(*k, FormValue::Text(v.to_string()));
        }
        RawInput::Form(form)
    }

    #[tokio::test]
    async fn test_numeric_coercion() {
        let schema = FormSchema::new().text("name").numeric("age");
        let object = schema.parse(form(&[("name", "bob"), ("age", "42")])).await.unwrap();

        assert_eq!(object.text("name"), Some("bob"));
        assert_eq!(object.number("age").and_then(Number::as_i64), Some(42));
        assert_eq!(object.to_json(), json!({ "name": "bob", "age": 42 }));
    }

    #[tokio::test]
    async fn test_typed_form() {
        let validator = FormSchema::new().text("name").numeric("age").typed::<User>();
        let user = validator.parse(form(&[("name", "bob"), ("age", "42")])).await.unwrap();
        assert_eq!(user, User { name: "bob".into(), age: 42 });

        let user = validator.parse(RawInput::Json(json!({ "name": "joe", "age": 7 }))).await.unwrap();
        assert_eq!(user.age, 7);
    }

    #[tokio::test]
    async fn test_collects_every_issue() {
        let schema = FormSchema::new().text("name").numeric("age");
        let err = schema.parse(form(&[("name", ""), ("age", "old")])).await.unwrap_err();

        let paths: Vec<_> = err.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "age"]);
        assert_eq!(err.issues[0].message, "Required");
    }

    #[tokio::test]
    async fn test_optional_checkbox_and_repeated() {
        let schema = FormSchema::new()
            .text("nickname")
            .optional()
            .checkbox("subscribe")
            .repeated("tag");
        let object = schema
            .parse(form(&[("subscribe", "on"), ("tag", "a"), ("tag", "b")]))
            .await
            .unwrap();

        assert!(object.text("nickname").is_none());
        assert!(object.flag("subscribe"));
        assert_eq!(object.list("tag"), &["a".to_string(), "b".to_string()]);

        let object = schema.parse(form(&[])).await.unwrap();
        assert!(!object.flag("subscribe"));
        assert!(object.list("tag").is_empty());
    }

    #[tokio::test]
    async fn test_blob_drains_and_file_stays_unread() {
        let bob = FilePart::from_bytes("bobfile", "bob.txt", "text/plain", "hi bob");
        let joe = FilePart::from_bytes("joefile", "joe.txt", "text/plain", "hi joe");
        let mut data = FormData::new();
        data.push("bobfile", FormValue::File(bob.clone()));
        data.push("joefile", FormValue::File(joe.clone()));

        let schema = FormSchema::new().blob("bobfile").file("joefile");
        let object = schema.parse(RawInput::Form(data)).await.unwrap();

        let blob = object.blob("bobfile").unwrap();
        assert_eq!(blob.text().unwrap(), "hi bob");
        assert_eq!(blob.filename, "bob.txt");
        assert!(bob.is_consumed());

        assert_eq!(object.file("joefile").unwrap().filename(), "joe.txt");
        assert!(!joe.is_consumed());
    }

    #[tokio::test]
    async fn test_blob_text_issue_names_the_field() {
        let part = FilePart::from_bytes("avatar", "me.bin", "application/octet-stream", vec![0xff, 0xfe]);
        let mut data = FormData::new();
        data.push("avatar", FormValue::File(part));

        let object = FormSchema::new().blob("avatar").parse(RawInput::Form(data)).await.unwrap();
        let err = object.blob("avatar").unwrap().text().unwrap_err();
        assert_eq!(err.issues[0].path, "avatar");
    }

    #[tokio::test]
    async fn test_file_rules_reject_text_and_json() {
        let schema = FormSchema::new().file("doc");
        let err = schema.parse(form(&[("doc", "not a file")])).await.unwrap_err();
        assert_eq!(err.issues[0].message, "Expected a file");

        let err = schema.parse(RawInput::Json(json!({ "doc": "x" }))).await.unwrap_err();
        assert_eq!(err.issues[0].path, "doc");
    }

    #[tokio::test]
    async fn test_no_drain_when_other_fields_fail() {
        let bob = FilePart::from_bytes("bobfile", "bob.txt", "text/plain", "hi bob");
        let mut data = FormData::new();
        data.push("bobfile", FormValue::File(bob.clone()));

        let schema = FormSchema::new().blob("bobfile").text("name");
        assert!(schema.parse(RawInput::Form(data)).await.is_err());
        assert!(!bob.is_consumed());
    }

    #[tokio::test]
    async fn test_non_object_json_is_rejected() {
        let schema = FormSchema::new().text("name");
        let err = schema.parse(RawInput::Json(json!([1, 2]))).await.unwrap_err();
        assert_eq!(err.issues.len(), 1);
    }
}
