/// Error taxonomy for the relay
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Travels inside coordinator replies, so it is serializable
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelayError {
    /// No PGN could be located after the whole fallback chain
    #[error("PGN not found on this page")]
    ExtractionFailed,

    /// The destination import field never appeared within the wait budget
    #[error("Import text area not found")]
    FieldNotFound,

    /// The durable store could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A message to the background coordinator failed or was refused
    #[error("Extension messaging failed: {0}")]
    Channel(String),

    /// The hosting page went away while a wait was in flight
    #[error("Page was closed before the operation finished")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RelayError>;
