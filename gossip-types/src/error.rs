//! Error types for the Gossip wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Frame was valid JSON but not valid UTF-8 text
    #[error("frame is not valid UTF-8")]
    NotText,

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
