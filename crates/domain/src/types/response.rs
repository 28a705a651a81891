//! Decoded responses and the deferred-acceptance marker

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PENDING_STATUS;
use crate::errors::{ClassifiedError, Result};

/// Handle to an operation the server accepted but has not finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncMarker {
    status: String,
    location: String,
    resource_id: String,
}

impl AsyncMarker {
    /// Build a marker from a `Location` header value. The resource id is the
    /// final path segment, ignoring query, fragment and a trailing slash.
    pub fn from_location(location: impl Into<String>) -> Self {
        let location = location.into();
        let resource_id = resource_id_from_location(&location).to_string();
        Self { status: PENDING_STATUS.to_string(), location, resource_id }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

fn resource_id_from_location(location: &str) -> &str {
    let without_fragment = location.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default();
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Response payload, decoded according to status and content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    /// 204 or a zero-length body
    Empty,
    Json(Value),
    /// Binary document formats (PDF, XML, archives, images)
    Binary(Vec<u8>),
    Text(String),
    /// Deferred acceptance; the resource is not available yet
    Deferred(AsyncMarker),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_marker(&self) -> Option<&AsyncMarker> {
        match self {
            Self::Deferred(marker) => Some(marker),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Status, headers and decoded body of a successful attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: ResponseBody,
}

impl TypedResponse {
    /// Header names are stored lower-cased.
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: ResponseBody) -> Self {
        let headers =
            headers.into_iter().map(|(name, value)| (name.to_ascii_lowercase(), value)).collect();
        Self { status, headers, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.body, ResponseBody::Deferred(_))
    }

    pub fn marker(&self) -> Option<&AsyncMarker> {
        self.body.as_marker()
    }

    /// Deserialize a JSON body. An empty body deserializes from `null`, so
    /// `()` and `Option<T>` work for 204 responses.
    ///
    /// # Errors
    /// Returns a `Configuration` error when the body is not JSON or does not
    /// match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.body {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Empty => Value::Null,
            ResponseBody::Deferred(_) => {
                return Err(ClassifiedError::configuration(
                    "response is a deferred acceptance, not a resource",
                )
                .with_status(self.status));
            }
            ResponseBody::Binary(_) | ResponseBody::Text(_) => {
                return Err(ClassifiedError::configuration("response body is not JSON")
                    .with_status(self.status));
            }
        };
        serde_json::from_value(value).map_err(|e| {
            ClassifiedError::configuration(format!("failed to parse response: {e}"))
                .with_status(self.status)
        })
    }
}
