//! Scripted in-process server for testing.
//!
//! [`MockServer`] answers each request from a per-event FIFO script, records
//! handshakes, requests and closes, and lets tests queue push events on the
//! latest authenticated connection. Every connection made through its
//! [`MockConnector`] gets its own inbound queue.

use super::{Connector, Transport, TransportError};
use async_trait::async_trait;
use gossip_types::{Ack, Frame, Handshake, PushEvent, RequestId};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// A request as the mock server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Index of the connection it arrived on
    pub connection: usize,
    /// Correlation id
    pub id: RequestId,
    /// Event name
    pub event: String,
    /// Request body
    pub payload: Value,
}

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Fail(String),
    Silent,
}

#[derive(Debug)]
struct Connection {
    handshake: Handshake,
    inbound: VecDeque<Vec<u8>>,
    open: bool,
}

#[derive(Debug, Default)]
struct ServerInner {
    scripts: HashMap<String, VecDeque<Reply>>,
    connections: Vec<Connection>,
    requests: Vec<RecordedRequest>,
    closes: usize,
    stall_when_idle: bool,
    fail_next_connect: Option<String>,
}

fn lock(inner: &Mutex<ServerInner>) -> MutexGuard<'_, ServerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted server shared by every connection it accepts.
#[derive(Debug, Default, Clone)]
pub struct MockServer {
    inner: Arc<Mutex<ServerInner>>,
    // Wakes receivers stalled on an empty queue.
    wake: Arc<Notify>,
}

impl MockServer {
    /// Create a server with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that opens connections to this server.
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            server: self.clone(),
        }
    }

    fn script(&self, event: &str, reply: Reply) {
        lock(&self.inner)
            .scripts
            .entry(event.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Answer the next `event` request with `success:true` and `data`'s fields.
    pub fn script_ok(&self, event: &str, data: Value) {
        self.script(event, Reply::Ok(data));
    }

    /// Answer the next `event` request with `success:false` and `error`.
    pub fn script_err(&self, event: &str, error: &str) {
        self.script(event, Reply::Fail(error.to_string()));
    }

    /// Never answer the next `event` request.
    pub fn script_silent(&self, event: &str) {
        self.script(event, Reply::Silent);
    }

    /// Make `recv()` wait on an empty queue for the next frame instead of
    /// reporting the connection closed.
    pub fn stall_when_idle(&self, stall: bool) {
        lock(&self.inner).stall_when_idle = stall;
    }

    /// Queue a push on the latest open authenticated connection.
    ///
    /// Returns `false` when there is no such connection.
    pub fn push(&self, event: PushEvent) -> bool {
        match Frame::push(event).and_then(|frame| frame.to_bytes()) {
            Ok(bytes) => self.push_raw(bytes),
            Err(_) => false,
        }
    }

    /// Queue raw frame bytes on the latest open authenticated connection.
    pub fn push_raw(&self, bytes: Vec<u8>) -> bool {
        let mut inner = lock(&self.inner);
        let target = inner
            .connections
            .iter_mut()
            .rev()
            .find(|c| c.open && c.handshake.is_authenticated());
        match target {
            Some(connection) => {
                connection.inbound.push_back(bytes);
                self.wake.notify_waiters();
                true
            }
            None => false,
        }
    }

    /// Close the latest open connection from the server side.
    pub fn sever(&self) {
        let mut inner = lock(&self.inner);
        if let Some(connection) = inner.connections.iter_mut().rev().find(|c| c.open) {
            connection.open = false;
        }
        self.wake.notify_waiters();
    }

    /// Cause the next connect to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Handshakes of every connection, in connect order.
    pub fn handshakes(&self) -> Vec<Handshake> {
        lock(&self.inner)
            .connections
            .iter()
            .map(|c| c.handshake.clone())
            .collect()
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Payloads of every `event` request, in arrival order.
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        lock(&self.inner)
            .requests
            .iter()
            .filter(|r| r.event == event)
            .map(|r| r.payload.clone())
            .collect()
    }

    /// Number of `event` requests received.
    pub fn request_count(&self, event: &str) -> usize {
        self.payloads(event).len()
    }

    /// Number of connections still open.
    pub fn open_connections(&self) -> usize {
        lock(&self.inner).connections.iter().filter(|c| c.open).count()
    }

    /// Number of client-initiated closes.
    pub fn closes(&self) -> usize {
        lock(&self.inner).closes
    }
}

/// Opens connections to a [`MockServer`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    server: MockServer,
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(
        &self,
        _origin: &str,
        handshake: &Handshake,
    ) -> Result<MockTransport, TransportError> {
        let mut inner = lock(&self.server.inner);

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connections.push(Connection {
            handshake: handshake.clone(),
            inbound: VecDeque::new(),
            open: true,
        });
        Ok(MockTransport {
            server: Arc::clone(&self.server.inner),
            wake: Arc::clone(&self.server.wake),
            index: inner.connections.len() - 1,
        })
    }
}

/// One connection to a [`MockServer`].
#[derive(Debug)]
pub struct MockTransport {
    server: Arc<Mutex<ServerInner>>,
    wake: Arc<Notify>,
    index: usize,
}

impl ServerInner {
    fn answer(&mut self, id: RequestId, event: &str) -> Option<Ack> {
        let reply = self
            .scripts
            .get_mut(event)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Fail(format!("unscripted event {event}")));
        match reply {
            Reply::Ok(data) => Some(Ack::ok(id, data)),
            Reply::Fail(error) => Some(Ack::failed(id, error)),
            Reply::Silent => None,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = lock(&self.server);

        if !inner.connections[self.index].open {
            return Err(TransportError::NotConnected);
        }

        let (id, event, payload) = match Frame::from_bytes(data) {
            Ok(Frame::Request { id, event, payload }) => (id, event, payload),
            Ok(_) => return Err(TransportError::SendFailed("client sent a non-request frame".into())),
            Err(e) => return Err(TransportError::SendFailed(e.to_string())),
        };

        inner.requests.push(RecordedRequest {
            connection: self.index,
            id,
            event: event.clone(),
            payload,
        });

        if let Some(ack) = inner.answer(id, &event) {
            let bytes = Frame::Ack(ack)
                .to_bytes()
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            inner.connections[self.index].inbound.push_back(bytes);
            self.wake.notify_waiters();
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            // Registered before the check so a concurrent push is not missed.
            let notified = self.wake.notified();
            {
                let mut inner = lock(&self.server);
                let stall = inner.stall_when_idle;
                let connection = &mut inner.connections[self.index];

                if let Some(bytes) = connection.inbound.pop_front() {
                    return Ok(bytes);
                }
                if !connection.open || !stall {
                    return Err(TransportError::ConnectionClosed);
                }
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.server).connections[self.index].open
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = lock(&self.server);
        if inner.connections[self.index].open {
            inner.connections[self.index].open = false;
            inner.closes += 1;
        }
        self.wake.notify_waiters();
        Ok(())
    }
}
