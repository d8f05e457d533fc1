//! Request/acknowledgement correlation over one transport.
//!
//! A [`Channel`] numbers every request and waits for the ack with the same
//! id, with an explicit timeout:
//! - an ack read on behalf of another outstanding call is parked for it
//! - an ack whose id is unknown or already resolved is dropped
//! - push frames read while waiting are kept in a backlog, in delivery order
//! - a terminal push (`forceLogout`, `authError`) ends every pending and
//!   future call with [`ClientError::SessionTerminated`]
//!
//! [`ChannelProvider`] owns the long-lived authenticated channel. Its
//! generation counter changes on every open and close, so a round trip that
//! straddles a teardown never reports success.

use gossip_types::requests::Call;
use gossip_types::{Ack, Frame, Handshake, PushEvent, RequestId, WireError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::transport::{Connector, Transport};

#[derive(Debug, Default)]
struct Mailbox {
    outstanding: HashSet<RequestId>,
    parked: HashMap<RequestId, Ack>,
    backlog: VecDeque<PushEvent>,
    terminated: bool,
}

impl Mailbox {
    fn take(&mut self, id: RequestId) -> Option<Result<Ack, ClientError>> {
        if let Some(ack) = self.parked.remove(&id) {
            return Some(Ok(ack));
        }
        if self.terminated {
            return Some(Err(ClientError::SessionTerminated));
        }
        None
    }
}

/// One connection with request-id correlation.
pub struct Channel {
    transport: Box<dyn Transport>,
    next_id: AtomicU64,
    timeout: Duration,
    mailbox: Mutex<Mailbox>,
    // Only one task reads from the transport at a time.
    reader: Mutex<()>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("connected", &self.transport.is_connected())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Channel {
    /// Wrap a connected transport.
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            timeout,
            mailbox: Mutex::new(Mailbox::default()),
            reader: Mutex::new(()),
        }
    }

    /// Whether the underlying transport is still open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send `request` and wait for its acknowledgement.
    ///
    /// A `success:false` ack becomes [`ClientError::Remote`] with the
    /// server's text.
    pub async fn call<C: Call>(&self, request: &C) -> Result<C::Response, ClientError> {
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let payload = serde_json::to_value(request).map_err(WireError::Serialization)?;
        let bytes = Frame::Request {
            id,
            event: C::EVENT.to_string(),
            payload,
        }
        .to_bytes()?;

        {
            let mut mailbox = self.mailbox.lock().await;
            if mailbox.terminated {
                return Err(ClientError::SessionTerminated);
            }
            mailbox.outstanding.insert(id);
        }

        debug!(event = C::EVENT, %id, "request");
        let outcome = match self.transport.send(&bytes).await {
            Ok(()) => tokio::time::timeout(self.timeout, self.await_ack(id)).await,
            Err(e) => Ok(Err(e.into())),
        };

        // Resolved exactly once: a late ack for this id is dropped.
        {
            let mut mailbox = self.mailbox.lock().await;
            mailbox.outstanding.remove(&id);
            mailbox.parked.remove(&id);
        }

        let ack = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(event = C::EVENT, %id, "request timed out");
                return Err(ClientError::Timeout {
                    event: C::EVENT,
                    timeout: self.timeout,
                });
            }
        };

        if !ack.success {
            let text = ack.error_text(&format!("{} failed", C::EVENT));
            debug!(event = C::EVENT, %id, error = %text, "request rejected");
            return Err(ClientError::Remote(text));
        }
        Ok(ack.decode()?)
    }

    async fn await_ack(&self, id: RequestId) -> Result<Ack, ClientError> {
        loop {
            if let Some(result) = self.mailbox.lock().await.take(id) {
                return result;
            }
            let _reader = self.reader.lock().await;
            // Another reader may have parked it while we waited for the lock.
            if let Some(result) = self.mailbox.lock().await.take(id) {
                return result;
            }
            let bytes = self.transport.recv().await?;
            self.route(&bytes).await;
        }
    }

    /// Sort one incoming frame into the mailbox.
    async fn route(&self, bytes: &[u8]) {
        let frame = match Frame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        let mut mailbox = self.mailbox.lock().await;
        match frame {
            Frame::Ack(ack) => {
                if mailbox.outstanding.contains(&ack.id) {
                    mailbox.parked.insert(ack.id, ack);
                } else {
                    warn!(id = %ack.id, "dropping ack for unknown or resolved request");
                }
            }
            Frame::Push { event, data } => match PushEvent::from_parts(&event, data) {
                Ok(push) => {
                    if push.kind().is_terminal() {
                        mailbox.terminated = true;
                    }
                    mailbox.backlog.push_back(push);
                }
                Err(e) => debug!(%event, error = %e, "dropping unknown push"),
            },
            Frame::Request { event, .. } => {
                warn!(%event, "dropping request frame sent by server");
            }
        }
    }

    /// Next push in delivery order, reading from the transport if none is
    /// queued.
    pub async fn next_push(&self) -> Result<PushEvent, ClientError> {
        loop {
            if let Some(push) = self.mailbox.lock().await.backlog.pop_front() {
                return Ok(push);
            }
            let _reader = self.reader.lock().await;
            if let Some(push) = self.mailbox.lock().await.backlog.pop_front() {
                return Ok(push);
            }
            let bytes = self.transport.recv().await?;
            self.route(&bytes).await;
        }
    }

    /// Take every queued push without reading from the transport.
    pub async fn drain_backlog(&self) -> Vec<PushEvent> {
        self.mailbox.lock().await.backlog.drain(..).collect()
    }

    /// Whether a terminal push has been read.
    pub async fn is_terminated(&self) -> bool {
        self.mailbox.lock().await.terminated
    }

    /// Close the transport.
    pub async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "error while closing channel");
        }
    }
}

/// Owns the long-lived authenticated channel and opens short-lived ones.
pub struct ChannelProvider<C: Connector> {
    connector: C,
    origin: String,
    timeout: Duration,
    current: Mutex<Option<Arc<Channel>>>,
    generation: AtomicU64,
}

impl<C: Connector> std::fmt::Debug for ChannelProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProvider")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .field("generation", &self.generation())
            .finish()
    }
}

impl<C: Connector> ChannelProvider<C> {
    /// Create a provider with no open channel.
    pub fn new(connector: C, origin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            connector,
            origin: origin.into(),
            timeout,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Changes every time the channel is opened or closed.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Open the authenticated channel, replacing any previous one.
    pub async fn open(&self, token: &str) -> Result<Arc<Channel>, ClientError> {
        let transport = self
            .connector
            .connect(&self.origin, &Handshake::Token(token.to_string()))
            .await?;
        let channel = Arc::new(Channel::new(Box::new(transport), self.timeout));

        let previous = {
            let mut current = self.current.lock().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            current.replace(Arc::clone(&channel))
        };
        if let Some(previous) = previous {
            previous.close().await;
        }
        info!(origin = %self.origin, "authenticated channel open");
        Ok(channel)
    }

    /// Tear down the authenticated channel, if any.
    pub async fn close(&self) {
        let previous = {
            let mut current = self.current.lock().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            current.take()
        };
        if let Some(channel) = previous {
            channel.close().await;
            info!("authenticated channel closed");
        }
    }

    /// The authenticated channel, if open.
    pub async fn current(&self) -> Option<Arc<Channel>> {
        self.current.lock().await.clone()
    }

    /// Round trip on the authenticated channel.
    ///
    /// Reports [`ClientError::SessionTerminated`] if the channel was replaced
    /// or torn down while the request was in flight, whatever the ack said.
    pub async fn call<R: Call>(&self, request: &R) -> Result<R::Response, ClientError> {
        let (channel, generation) = {
            let current = self.current.lock().await;
            let channel = current.clone().ok_or(ClientError::NotConnected)?;
            (channel, self.generation())
        };
        let result = channel.call(request).await;
        if self.generation() != generation {
            debug!(event = R::EVENT, "discarding response from a replaced channel");
            return Err(ClientError::SessionTerminated);
        }
        result
    }

    /// One exchange on a fresh anonymous channel, closed unconditionally.
    pub async fn one_shot<R: Call>(&self, request: &R) -> Result<R::Response, ClientError> {
        let transport = self
            .connector
            .connect(&self.origin, &Handshake::Flow(R::EVENT.to_string()))
            .await?;
        let channel = Channel::new(Box::new(transport), self.timeout);
        let result = channel.call(request).await;
        channel.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockServer;
    use gossip_types::requests::{GetUser, Login, Logout};
    use gossip_types::UserId;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn provider(server: &MockServer) -> ChannelProvider<crate::transport::MockConnector> {
        ChannelProvider::new(server.connector(), "ws://test", TIMEOUT)
    }

    fn get_user(id: &str) -> GetUser {
        GetUser {
            user_id: UserId::from(id),
        }
    }

    // ===========================================
    // Correlation
    // ===========================================

    #[tokio::test]
    async fn call_decodes_typed_response() {
        let server = MockServer::new();
        server.script_ok("getUser", json!({"user": {"_id": "bob", "name": "Bob"}}));
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        let response = provider.call(&get_user("bob")).await.unwrap();

        assert_eq!(response.user.name, "Bob");
        assert_eq!(server.payloads("getUser"), vec![json!({"userId": "bob"})]);
    }

    #[tokio::test]
    async fn request_ids_increase_from_one() {
        let server = MockServer::new();
        server.script_ok("logout", json!({}));
        server.script_ok("logout", json!({}));
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        provider.call(&Logout {}).await.unwrap();
        provider.call(&Logout {}).await.unwrap();

        let ids: Vec<u64> = server.requests().iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_ack_surfaces_server_text() {
        let server = MockServer::new();
        server.script_err("getUser", "User not found");
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        let err = provider.call(&get_user("ghost")).await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref text) if text == "User not found"));
    }

    #[tokio::test]
    async fn foreign_ack_is_dropped() {
        let server = MockServer::new();
        server.script_ok("logout", json!({}));
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        let stray = Frame::Ack(Ack::ok(RequestId::new(99), json!({})));
        server.push_raw(stray.to_bytes().unwrap());

        provider.call(&Logout {}).await.unwrap();
    }

    #[tokio::test]
    async fn pushes_read_while_waiting_are_backlogged() {
        let server = MockServer::new();
        server.script_ok("logout", json!({}));
        let provider = provider(&server);
        let channel = provider.open("tok").await.unwrap();
        server.push(PushEvent::OnlineUsers(vec!["bob".into()]));

        provider.call(&Logout {}).await.unwrap();

        let backlog = channel.drain_backlog().await;
        assert_eq!(backlog, vec![PushEvent::OnlineUsers(vec!["bob".into()])]);
        assert!(channel.drain_backlog().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_push_is_dropped() {
        let server = MockServer::new();
        server.script_ok("logout", json!({}));
        let provider = provider(&server);
        let channel = provider.open("tok").await.unwrap();
        let unknown = Frame::Push {
            event: "typing".into(),
            data: json!({}),
        };
        server.push_raw(unknown.to_bytes().unwrap());

        provider.call(&Logout {}).await.unwrap();
        assert!(channel.drain_backlog().await.is_empty());
    }

    // ===========================================
    // Termination and Timeouts
    // ===========================================

    #[tokio::test]
    async fn terminal_push_overrides_pending_call() {
        let server = MockServer::new();
        server.script_ok("logout", json!({}));
        let provider = provider(&server);
        let channel = provider.open("tok").await.unwrap();
        server.push(PushEvent::ForceLogout { message: None });

        let err = provider.call(&Logout {}).await.unwrap_err();

        assert!(matches!(err, ClientError::SessionTerminated));
        assert!(channel.is_terminated().await);
        assert_eq!(
            channel.drain_backlog().await,
            vec![PushEvent::ForceLogout { message: None }]
        );
        // Later calls fail without touching the network
        assert!(matches!(
            provider.call(&Logout {}).await,
            Err(ClientError::SessionTerminated)
        ));
        assert_eq!(server.request_count("logout"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let server = MockServer::new();
        server.stall_when_idle(true);
        server.script_silent("logout");
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        let err = provider.call(&Logout {}).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { event: "logout", .. }));
    }

    #[tokio::test]
    async fn call_without_channel_is_not_connected() {
        let server = MockServer::new();
        let provider = provider(&server);
        assert!(matches!(
            provider.call(&Logout {}).await,
            Err(ClientError::NotConnected)
        ));
    }

    // ===========================================
    // Provider Lifecycle
    // ===========================================

    #[tokio::test]
    async fn open_replaces_and_closes_previous_channel() {
        let server = MockServer::new();
        let provider = provider(&server);

        let first = provider.open("one").await.unwrap();
        let generation = provider.generation();
        provider.open("two").await.unwrap();

        assert!(!first.is_connected());
        assert_ne!(provider.generation(), generation);
        assert_eq!(server.open_connections(), 1);
    }

    #[tokio::test]
    async fn close_invalidates_handle() {
        let server = MockServer::new();
        let provider = provider(&server);
        provider.open("tok").await.unwrap();

        provider.close().await;

        assert!(provider.current().await.is_none());
        assert_eq!(server.open_connections(), 0);
    }

    #[tokio::test]
    async fn one_shot_closes_on_success_and_failure() {
        let server = MockServer::new();
        server.script_err("login", "Invalid credentials");
        let provider = provider(&server);
        let login = Login {
            email: "a@example.com".into(),
            password: "pw".into(),
        };

        let err = provider.one_shot(&login).await.unwrap_err();

        assert!(matches!(err, ClientError::Remote(_)));
        assert_eq!(server.handshakes(), vec![Handshake::Flow("login".into())]);
        assert_eq!(server.open_connections(), 0);
        assert_eq!(server.closes(), 1);
    }
}
