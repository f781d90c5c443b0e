//! Error taxonomy for API calls.
//!
//! Every non-success outcome of a call maps to exactly one [`ErrorKind`].
//! Classification is a pure function of the status code and the server's
//! machine-readable code, so it can be tested without a network.
//!
//! Key design decisions:
//! - Status codes stored as [`HttpStatusCode`], never re-parsed from text
//! - `ApiError` is `Clone`: one refresh failure is handed to every waiter
//! - All errors include ErrorLocation for debugging

use common::{ErrorLocation, HttpStatusCode};

use std::fmt;
use std::panic::Location;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

/// Server codes that mark a 401 as "refresh and try again".
pub const EXPIRED_TOKEN_CODES: [&str; 2] = ["TOKEN_EXPIRED", "INVALID_TOKEN"];

const MESSAGE_SEPARATOR: &str = "; ";

/// Kind of failure, used by the executor to decide whether to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    AuthExpired,
    AuthInvalid,
    AuthForbidden,
    Validation,
    Conflict,
    NotFound,
    ServerError,
    NetworkFailure,
    Unknown,
}

impl ErrorKind {
    /// Classify a failed response.
    pub fn classify(status: HttpStatusCode, code: Option<&str>) -> Self {
        match status.as_u16() {
            401 if code.is_some_and(|c| EXPIRED_TOKEN_CODES.contains(&c)) => ErrorKind::AuthExpired,
            401 => ErrorKind::AuthInvalid,
            403 => ErrorKind::AuthForbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            _ if status.is_validation_failure() => ErrorKind::Validation,
            _ if status.is_server_error() => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }

    /// Whether the backend turned the credential down, as opposed to failing
    /// to answer at all.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ErrorKind::AuthExpired
                | ErrorKind::AuthInvalid
                | ErrorKind::AuthForbidden
                | ErrorKind::Validation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::AuthExpired => "Auth Expired",
            ErrorKind::AuthInvalid => "Auth Invalid",
            ErrorKind::AuthForbidden => "Auth Forbidden",
            ErrorKind::Validation => "Validation",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::ServerError => "Server",
            ErrorKind::NetworkFailure => "Network",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Terminal failure of a logical API call.
///
/// Carries everything the UI needs to render a message without going back
/// to the network layer.
#[derive(Debug, Clone, ThisError, Serialize)]
#[error("{kind} Error: {message} {location}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<HttpStatusCode>,
    pub details: Option<Value>,
    pub location: ErrorLocation,
}

impl ApiError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
            code: None,
            status: None,
            details: None,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// No access token is available for an authenticated call.
    #[track_caller]
    pub fn missing_token() -> Self {
        Self::new(ErrorKind::AuthInvalid, "Not signed in")
    }

    /// Transport failure: no response was received.
    #[track_caller]
    pub fn from_transport(error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("Request timed out: {error}")
        } else if error.is_connect() {
            format!("Could not connect to server: {error}")
        } else {
            format!("Network request failed: {error}")
        };

        Self::new(ErrorKind::NetworkFailure, message)
    }

    /// Build the error for a non-2xx response from its raw body.
    ///
    /// The body is read as JSON when it parses. `message` may be a string
    /// or a list of strings (field validation); `code` may also be spelled
    /// `errorCode`.
    #[track_caller]
    pub fn from_response(status: HttpStatusCode, body: &[u8]) -> Self {
        let location = ErrorLocation::from(Location::caller());
        let parsed = serde_json::from_slice::<Value>(body).ok();

        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code").or_else(|| v.get("errorCode")))
            .and_then(Value::as_str)
            .map(str::to_owned);

        let (message, message_list) = match parsed.as_ref().and_then(|v| v.get("message")) {
            Some(Value::String(text)) if !text.is_empty() => (Some(text.clone()), None),
            Some(Value::Array(items)) if !items.is_empty() => {
                let joined = items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(MESSAGE_SEPARATOR);
                (Some(joined), Some(Value::Array(items.clone())))
            }
            _ => (None, None),
        };

        let message = message
            .or_else(|| {
                parsed
                    .as_ref()
                    .and_then(|v| v.get("error"))
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| fallback_message(status));

        let details = parsed
            .as_ref()
            .and_then(|v| v.get("details"))
            .filter(|d| !d.is_null())
            .cloned()
            .or(message_list);

        ApiError {
            kind: ErrorKind::classify(status, code.as_deref()),
            message,
            code,
            status: Some(status),
            details,
            location,
        }
    }

    /// Same failure, reported under a different kind.
    ///
    /// Used when a refresh rejection has to surface as `AuthInvalid`.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }
}

fn fallback_message(status: HttpStatusCode) -> String {
    reqwest::StatusCode::from_u16(status.as_u16())
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}
