//! Call inputs: declared parameters, their per-call values, the input
//! message and the session.

use std::borrow::Cow;
use std::collections::HashMap;

use fsbridge_vfs::{Charset, FsResult};

/// Names of the parameters a caller declares at configure time.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    names: Vec<String>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ParameterList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl ParameterValue {
    /// Text form; bytes are decoded lossily.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            ParameterValue::Text(text) => Cow::Borrowed(text.as_str()),
            ParameterValue::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Raw content, encoding text with `charset`.
    pub fn to_bytes(&self, charset: Charset) -> FsResult<Vec<u8>> {
        match self {
            ParameterValue::Text(text) => charset.encode(text),
            ParameterValue::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(text: &str) -> Self {
        ParameterValue::Text(text.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(text: String) -> Self {
        ParameterValue::Text(text)
    }
}

impl From<Vec<u8>> for ParameterValue {
    fn from(bytes: Vec<u8>) -> Self {
        ParameterValue::Bytes(bytes)
    }
}

/// Parameter values resolved for one call.
#[derive(Debug, Clone, Default)]
pub struct ParameterValues {
    values: HashMap<String, ParameterValue>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(ParameterValue::as_text)
    }
}

/// The input message of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Message {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
}

impl Message {
    pub fn is_empty(&self) -> bool {
        match self {
            Message::Empty => true,
            Message::Text(text) => text.is_empty(),
            Message::Bytes(bytes) => bytes.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Message::Empty => None,
            Message::Text(text) => Some(Cow::Borrowed(text.as_str())),
            Message::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
        }
    }

    pub fn to_bytes(&self, charset: Charset) -> FsResult<Vec<u8>> {
        match self {
            Message::Empty => Ok(Vec::new()),
            Message::Text(text) => charset.encode(text),
            Message::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Message::Bytes(bytes)
    }
}

/// Identifies the conversation a call belongs to. Only used for logging.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
