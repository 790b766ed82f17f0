//! Structured inputs produced by the server's content-type handlers.

use serde_json::Value;

use crate::content_type::file::FilePart;

/// Decoded, not yet validated, procedure input.
#[derive(Debug, Clone)]
pub enum RawInput {
    /// Input of a JSON-encoded call.
    Json(Value),
    /// Input of a multipart call: text fields and unread file parts.
    Form(FormData),
}

impl RawInput {
    pub fn is_form(&self) -> bool {
        matches!(self, RawInput::Form(_))
    }
}

/// A value of one multipart field.
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }
}

/// Ordered multipart fields; a name may repeat.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Every value for `name`, in submission order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.get(name).and_then(FormValue::as_file)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
