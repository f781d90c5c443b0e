//! Client core of the Ledger desktop application.
//!
//! Two things live here, and every screen goes through them:
//!
//! - [`RequestExecutor::call`]: authenticated REST calls with one
//!   transparent token refresh and a fixed error taxonomy ([`ErrorKind`])
//! - [`hierarchy::build`]: flat parent-referencing lists (accounts,
//!   categories) to forests with depths, safe against bad data
//!
//! Token persistence, configuration and logging are wired here as well; the
//! screens themselves are not.

pub mod auth;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod http;
pub mod logger;
pub mod models;

#[cfg(test)]
mod tests;

pub use auth::{AuthGateway, Credentials, Session, SessionState, TokenPair, TokenStore};
pub use config::{ApiConfig, ClientConfig};
pub use error::{ApiError, CoreError, ErrorKind};
pub use http::{Payload, RequestDescriptor, RequestExecutor};
