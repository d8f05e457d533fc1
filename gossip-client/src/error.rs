//! Client errors.

use gossip_core::{CooldownError, ValidationError};
use gossip_types::WireError;
use std::time::Duration;
use thiserror::Error;

use crate::storage::StorageError;
use crate::transport::TransportError;

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Persisted state could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No channel is open.
    #[error("not connected")]
    NotConnected,

    /// The operation needs a session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The server answered `success:false`; the text is the server's.
    #[error("{0}")]
    Remote(String),

    /// Input rejected before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resend requested inside the cooldown window.
    #[error(transparent)]
    Cooldown(#[from] CooldownError),

    /// No acknowledgement arrived in time.
    #[error("no response to {event} within {timeout:?}")]
    Timeout {
        /// Event that went unanswered
        event: &'static str,
        /// How long the client waited
        timeout: Duration,
    },

    /// The session ended while the request was in flight.
    #[error("session terminated")]
    SessionTerminated,

    /// The operation needs a selected conversation.
    #[error("no conversation selected")]
    NoConversation,
}

impl ClientError {
    /// Whether this error ended (or found no) session.
    pub fn is_session_loss(&self) -> bool {
        matches!(
            self,
            ClientError::SessionTerminated | ClientError::NotAuthenticated
        )
    }
}
