//! Transport abstraction for the Gossip client.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! Connecting and exchanging frames are split:
//! - a [`Connector`] opens one connection per handshake
//! - the [`Transport`] it yields sends and receives whole frames
//! - `close()` terminates that connection only
//!
//! Long-lived channels connect with a token handshake; anonymous flows use a
//! fresh connection per exchange, so a connector is called many times over
//! the life of a client.

mod mock;
mod ws;

pub use mock::{MockConnector, MockServer, MockTransport, RecordedRequest};
pub use ws::{WsConnector, WsTransport};

use async_trait::async_trait;
use gossip_types::Handshake;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Origin is not a usable URL.
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),
}

/// One open connection carrying JSON frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Blocks until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the connection is still open.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens connections to the backend origin.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The transport produced for each connection.
    type Transport: Transport + 'static;

    /// Connect to `origin`, authenticating with `handshake`.
    async fn connect(
        &self,
        origin: &str,
        handshake: &Handshake,
    ) -> Result<Self::Transport, TransportError>;
}
