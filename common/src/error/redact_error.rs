use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a redacted value is handed to a serializer.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Refused to serialize {type_name}: call as_str() at the point of transmission {location}")]
    Serialization {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
