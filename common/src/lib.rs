//! Shared building blocks for the Ledger client.
//!
//! Nothing in here talks to the network or the filesystem. These are the
//! small value types every other crate in the workspace leans on:
//!
//! - [`ErrorLocation`]: call-site capture appended to every error message
//! - [`HttpStatusCode`]: status helpers used when classifying failures
//! - [`RedactedSecret`]: tokens and passwords that never reach a log line

pub mod error;
pub mod http_status;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;
