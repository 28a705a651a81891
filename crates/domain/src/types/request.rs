//! Immutable description of one API call

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ClassifiedError, Result};

/// HTTP methods used by the issuance API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected shape of the response body, mapped to an `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accept {
    /// Structured JSON resource
    #[default]
    Json,
    /// Rendered PDF document
    Pdf,
    /// XML document
    Xml,
    /// Any other binary payload
    Binary,
    /// Plain text
    Text,
}

impl Accept {
    pub const fn header_value(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Pdf => "application/pdf",
            Self::Xml => "application/xml",
            Self::Binary => "application/octet-stream",
            Self::Text => "text/plain",
        }
    }
}

/// One part of a multipart upload. The boundary and content type of the whole
/// payload are chosen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartPart {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), file_name: None, content_type: None, data: data.into() }
    }

    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Raw { content_type: String, bytes: Vec<u8> },
    /// Opaque multipart payload; never given an explicit content type.
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Content type to send, or `None` when the transport must pick it.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Json(_) => Some("application/json"),
            Self::Raw { content_type, .. } => Some(content_type.as_str()),
            Self::Multipart(_) => None,
        }
    }
}

/// Method, path, query, body, header overrides and accept override of a
/// single logical call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    headers: Vec<(String, String)>,
    accept: Option<Accept>,
}

impl RequestSpec {
    /// `path` is either relative to the configured base URL or an absolute
    /// URL (as returned in a `Location` header).
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            accept: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    /// Returns a `Configuration` error when `body` cannot be represented as
    /// JSON.
    pub fn try_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            ClassifiedError::configuration(format!("failed to serialize request body: {e}"))
        })?;
        Ok(self.json(value))
    }

    #[must_use]
    pub fn raw(mut self, content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Raw { content_type: content_type.into(), bytes: bytes.into() });
        self
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = Some(RequestBody::Multipart(parts));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn accept(mut self, accept: Accept) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn header_overrides(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Effective accept shape (JSON unless overridden).
    pub fn expected(&self) -> Accept {
        self.accept.unwrap_or_default()
    }
}
