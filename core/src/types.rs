//! Request and result values.
//!
//! # Design
//! `RequestDescriptor` is built once by the caller and never mutated. It is
//! deliberately not validated on construction: a missing or broken URL is a
//! configuration error reported when the task runs, like every other failure.
//! The echoed parameters are pulled from the URL's query string so callers
//! can tell apart responses whose bodies look identical (the laundry API
//! returns the same document shape for different `method`s).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// The structured shape a response body is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ResultShape {
    /// A JSON array of documents.
    Array,
    /// A single JSON object.
    Object,
    /// Anything else. Always rejected before any network I/O.
    Unknown,
}

impl ResultShape {
    /// Query parameters echoed back alongside a result of this shape.
    pub fn echo_parameter_names(self) -> &'static [&'static str] {
        match self {
            ResultShape::Array => &["location"],
            ResultShape::Object => &["method", "location"],
            ResultShape::Unknown => &[],
        }
    }
}

impl FromStr for ResultShape {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "array" => ResultShape::Array,
            "object" => ResultShape::Object,
            _ => ResultShape::Unknown,
        })
    }
}

impl From<String> for ResultShape {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(shape) => shape,
            Err(never) => match never {},
        }
    }
}

/// What to fetch and how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: Option<String>,
    shape: ResultShape,
}

impl RequestDescriptor {
    pub fn new(url: impl Into<String>, shape: ResultShape) -> Self {
        Self {
            url: Some(url.into()),
            shape,
        }
    }

    /// A descriptor with no URL at all. Valid to build; fails when run.
    pub fn without_url(shape: ResultShape) -> Self {
        Self { url: None, shape }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    /// Percent-decoded value of the first `name=` pair in the URL's query.
    pub fn query_parameter(&self, name: &str) -> Option<String> {
        let url = Url::parse(self.url.as_deref()?).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Echoed parameter values in the order given by
    /// [`ResultShape::echo_parameter_names`]. A key missing from the query
    /// keeps its slot as `None`.
    pub fn echoed_parameters(&self) -> Vec<Option<String>> {
        self.shape
            .echo_parameter_names()
            .iter()
            .map(|name| self.query_parameter(name))
            .collect()
    }
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl Payload {
    pub fn shape(&self) -> ResultShape {
        match self {
            Payload::Array(_) => ResultShape::Array,
            Payload::Object(_) => ResultShape::Object,
        }
    }

    /// Number of elements (array) or keys (object).
    pub fn len(&self) -> usize {
        match self {
            Payload::Array(items) => items.len(),
            Payload::Object(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Payload::Array(items) => Some(items),
            Payload::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Payload::Object(map) => Some(map),
            Payload::Array(_) => None,
        }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// The success outcome handed to a [`crate::ResultListener`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub payload: Payload,
    pub parameters: Vec<Option<String>>,
}
