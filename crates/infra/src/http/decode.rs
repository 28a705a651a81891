//! Response decoding helpers
//!
//! Bodies are decoded by content type: JSON for `application/json` and
//! `+json` suffixes, raw bytes for document formats, text otherwise.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use issuance_domain::{ClassifiedError, ResponseBody, Result};
use reqwest::header::HeaderMap;

const BINARY_TYPES: &[&str] = &[
    "application/pdf",
    "application/octet-stream",
    "application/zip",
    "application/xml",
    "text/xml",
];

/// Media type without parameters, lower-cased.
fn media_type(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

pub fn is_json(content_type: &str) -> bool {
    let media = media_type(content_type);
    media == "application/json" || media.ends_with("+json")
}

pub fn is_binary(content_type: &str) -> bool {
    let media = media_type(content_type);
    media.starts_with("image/") || BINARY_TYPES.contains(&media.as_str())
}

/// Decode the body of a successful response.
///
/// # Errors
/// Returns a `Configuration` error when a JSON content type carries a body
/// that does not parse.
pub fn decode_success(status: u16, content_type: Option<&str>, bytes: Vec<u8>) -> Result<ResponseBody> {
    if bytes.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    match content_type {
        Some(ct) if is_json(ct) => serde_json::from_slice(&bytes).map(ResponseBody::Json).map_err(|e| {
            ClassifiedError::configuration(format!("failed to parse JSON response: {e}"))
                .with_status(status)
        }),
        Some(ct) if is_binary(ct) => Ok(ResponseBody::Binary(bytes)),
        _ => Ok(text_or_binary(bytes)),
    }
}

/// Decode the body of an error response. Never fails: a body that does not
/// match its declared type is kept as text.
pub fn decode_error(content_type: Option<&str>, bytes: Vec<u8>) -> ResponseBody {
    if bytes.is_empty() {
        return ResponseBody::Empty;
    }
    let json_expected = content_type.map_or(true, is_json);
    if json_expected {
        if let Ok(value) = serde_json::from_slice(&bytes) {
            return ResponseBody::Json(value);
        }
    }
    text_or_binary(bytes)
}

fn text_or_binary(bytes: Vec<u8>) -> ResponseBody {
    match String::from_utf8(bytes) {
        Ok(text) => ResponseBody::Text(text),
        Err(err) => ResponseBody::Binary(err.into_bytes()),
    }
}

/// Parse a `Retry-After` value: delay seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Header map with lower-cased names. Non-UTF-8 values are skipped; repeated
/// headers are joined with `, `.
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}
