//! CLI command implementations.

pub mod auth;
pub mod chat;
pub mod contacts;

use anyhow::{Context, Result};
use gossip_client::{ClientConfig, FileStore, GossipClient, KeyValueStore, WsConnector};
use gossip_types::{GroupId, Identity, UserId};
use std::path::Path;
use std::sync::Arc;

/// Configuration file looked up in the data directory.
pub const CONFIG_FILE: &str = "gossip.toml";

/// Persisted token and theme, inside the data directory.
pub const STATE_FILE: &str = "state.json";

/// Client over the WebSocket transport.
pub type Client = GossipClient<WsConnector>;

/// Conversation addressed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Direct conversation with a user
    Peer(UserId),
    /// Group conversation
    Group(GroupId),
}

impl Target {
    /// Exactly one of `user` and `group` must be given.
    pub fn from_args(user: Option<String>, group: Option<String>) -> Result<Self> {
        match (user, group) {
            (Some(user), None) => Ok(Target::Peer(user.into())),
            (None, Some(group)) => Ok(Target::Group(group.into())),
            _ => anyhow::bail!("Must specify either a user or --group"),
        }
    }
}

/// Build a client from the data directory and an optional config file.
///
/// A missing config file means defaults.
pub fn open_client(data_dir: &Path, config_path: &Path) -> Result<Client> {
    let config = if config_path.exists() {
        ClientConfig::from_file(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        ClientConfig::default()
    };
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(data_dir.join(STATE_FILE)));
    Ok(GossipClient::websocket(config, storage))
}

/// Restore the stored session, failing when nobody is signed in.
pub async fn require_login(client: &Client) -> Result<Identity> {
    client
        .restore_session()
        .await
        .context("Failed to reach the server")?
        .context("Not logged in. Run 'gossip-cli login --email <email>' first.")
}
