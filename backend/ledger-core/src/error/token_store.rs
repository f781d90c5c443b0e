use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Failures opening a persisted token file.
///
/// Writes never produce one of these: a failed persist is logged and the
/// in-memory pair stays authoritative for the rest of the session.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Token File Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Token File Directory Error: {path}: {source} {location}")]
    Directory {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
