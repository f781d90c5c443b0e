pub mod api;
pub mod config;
pub mod logger;
pub mod token_store;

pub use api::{ApiError, ErrorKind};
pub use config::ConfigError;
pub use logger::LoggerError;
pub use token_store::TokenStoreError;

use common::ErrorLocation;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] api::ApiError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    TokenStore(#[from] token_store::TokenStoreError),

    #[error(transparent)]
    Logger(#[from] logger::LoggerError),

    #[error("HTTP Client Error: {message} {location}")]
    HttpClient {
        message: String,
        location: ErrorLocation,
    },
}
