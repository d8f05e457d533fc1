//! WebSocket transport over tokio-tungstenite.
//!
//! One JSON frame per text message. The handshake travels in the query
//! string (`?token=...` or `?flow=...`), so the full URL is never logged.

use super::{Connector, Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gossip_types::Handshake;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the WebSocket URL for `origin` carrying `handshake`.
///
/// `http`/`https` origins are mapped to `ws`/`wss`.
pub(crate) fn endpoint(origin: &str, handshake: &Handshake) -> Result<Url, TransportError> {
    let mut url = Url::parse(origin).map_err(|e| TransportError::InvalidOrigin(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidOrigin(format!(
                "unsupported scheme {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidOrigin(format!("cannot use scheme {scheme}")))?;
    let (key, value) = handshake.query_pair();
    url.query_pairs_mut().append_pair(key, value);
    Ok(url)
}

/// Opens WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(
        &self,
        origin: &str,
        handshake: &Handshake,
    ) -> Result<WsTransport, TransportError> {
        let url = endpoint(origin, handshake)?;
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        info!(
            origin,
            authenticated = handshake.is_authenticated(),
            status = %response.status(),
            "websocket connected"
        );

        let (sink, stream) = stream.split();
        Ok(WsTransport {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            connected: AtomicBool::new(true),
        })
    }
}

/// One WebSocket connection.
pub struct WsTransport {
    sink: Mutex<SplitSink<Stream, Message>>,
    stream: Mutex<SplitStream<Stream>>,
    connected: AtomicBool,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let text = String::from_utf8(data.to_vec())
            .map_err(|_| TransportError::SendFailed("frame is not UTF-8".into()))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket closed by peer");
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                // Control frames are answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}
