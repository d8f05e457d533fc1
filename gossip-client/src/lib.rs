//! # gossip-client
//!
//! Client library for the Gossip realtime messaging service.
//!
//! This is the library applications embed: it owns the session, the social
//! graph, the group listing and the active conversation, and keeps them in
//! step with the server over one persistent channel.
//!
//! ## Features
//!
//! - **Acknowledged mutations**: state changes only after the server's ack
//! - **Request correlation**: every request carries an id and a timeout
//! - **Race-free conversations**: stale history responses are fenced out
//! - **Transport abstraction**: WebSocket in production, scripted mock in tests
//! - **Pure state machines**: lifecycle logic lives in gossip-core
//!
//! ## Example
//!
//! ```ignore
//! use gossip_client::{ClientConfig, GossipClient, MemoryStore};
//! use std::sync::Arc;
//!
//! let client = GossipClient::websocket(ClientConfig::default(), Arc::new(MemoryStore::new()));
//! client.login("alice@example.com", "secret").await?;
//! client.load_friends().await?;
//! client.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod groups;
pub mod notify;
pub mod router;
pub mod session;
pub mod social;
pub mod storage;
pub mod theme;
pub mod transport;

pub use channel::{Channel, ChannelProvider};
pub use client::GossipClient;
pub use config::{ClientConfig, ConfigError};
pub use conversation::ConversationStore;
pub use error::ClientError;
pub use groups::GroupStore;
pub use notify::{Notifier, Topic, UiEvent};
pub use router::{Dispatch, Router, Subscriptions};
pub use session::{SessionManager, SharedSession};
pub use social::SocialStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, THEME_KEY, TOKEN_KEY};
pub use theme::ThemeStore;
pub use transport::{
    Connector, MockConnector, MockServer, MockTransport, RecordedRequest, Transport,
    TransportError, WsConnector, WsTransport,
};
