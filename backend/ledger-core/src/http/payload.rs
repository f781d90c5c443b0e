//! Decoding of successful response bodies.

use crate::error::{ApiError, ErrorKind};

use serde::de::DeserializeOwned;
use serde_json::Value;

const BINARY_TYPE_PREFIXES: [&str; 4] = ["image/", "audio/", "video/", "font/"];
const BINARY_APPLICATION_TYPES: [&str; 3] = [
    "application/octet-stream",
    "application/pdf",
    "application/zip",
];
const VENDOR_TYPE_PREFIX: &str = "application/vnd.";

/// Opaque body of a binary response (exports, attachments, invoices).
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Blob(Blob),
    /// 204, or a 2xx with nothing in it.
    Empty,
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_blob(self) -> Option<Blob> {
        match self {
            Payload::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// Deserialize the JSON body into `T`. An empty body reads as `null`.
    #[track_caller]
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            Payload::Json(value) => value,
            Payload::Empty => Value::Null,
            Payload::Blob(blob) => {
                return Err(ApiError::new(
                    ErrorKind::Unknown,
                    format!("Expected JSON, got {} bytes of {}", blob.bytes.len(), blob.content_type),
                ));
            }
        };

        serde_json::from_value(value).map_err(|e| {
            ApiError::new(ErrorKind::Unknown, format!("Unexpected response shape: {e}"))
        })
    }
}

/// Media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_binary_content_type(content_type: &str) -> bool {
    let essence = essence(content_type);

    BINARY_APPLICATION_TYPES.contains(&essence.as_str())
        || BINARY_TYPE_PREFIXES.iter().any(|p| essence.starts_with(p))
        || (essence.starts_with(VENDOR_TYPE_PREFIX) && !essence.ends_with("+json"))
}

pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

/// Turn a 2xx body into a [`Payload`] according to its content type.
#[track_caller]
pub fn decode(content_type: Option<&str>, bytes: Vec<u8>) -> Result<Payload, ApiError> {
    if let Some(content_type) = content_type.filter(|ct| is_binary_content_type(ct)) {
        return Ok(Payload::Blob(Blob {
            content_type: essence(content_type),
            bytes,
        }));
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Empty);
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(Payload::Json(value)),
        Err(e) if content_type.is_some_and(is_json_content_type) => Err(ApiError::new(
            ErrorKind::Unknown,
            format!("Malformed JSON response: {e}"),
        )),
        Err(_) => Ok(Payload::Json(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))),
    }
}
