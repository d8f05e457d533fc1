//! GossipClient - the main interface to a Gossip server.
//!
//! # Architecture
//!
//! The facade wires one [`ChannelProvider`] into the four stores and the
//! push [`Router`]. Store operations mutate state only on acknowledgement;
//! pushes read while a request was waiting are dispatched right after the
//! operation returns, in delivery order.
//!
//! ```text
//! UI → GossipClient → stores → ChannelProvider → Transport → Network
//!           ↑                        │
//!           └────── Router ←──── push events
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gossip_client::{ClientConfig, FileStore, GossipClient};
//! use std::sync::Arc;
//!
//! let client = GossipClient::websocket(ClientConfig::default(), Arc::new(FileStore::new(path)));
//! if client.restore_session().await?.is_none() {
//!     client.login("alice@example.com", "secret").await?;
//! }
//! client.open_peer("bob".into()).await?;
//! client.send_message(MessageBody::text("hi")).await?;
//! client.run().await?;
//! ```

use gossip_core::{ConversationKey, Event, GroupForm, Theme, ToggleOutcome};
use gossip_types::{
    Group, GroupId, Identity, Message, MessageBody, MessageTarget, User, UserId,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::channel::ChannelProvider;
use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::error::ClientError;
use crate::groups::GroupStore;
use crate::notify::{Notifier, UiEvent};
use crate::router::{Dispatch, Router};
use crate::session::SessionManager;
use crate::social::SocialStore;
use crate::storage::KeyValueStore;
use crate::theme::ThemeStore;
use crate::transport::{Connector, WsConnector};

/// The client facade.
pub struct GossipClient<C: Connector> {
    config: ClientConfig,
    provider: Arc<ChannelProvider<C>>,
    notifier: Notifier,
    session: Arc<SessionManager<C>>,
    conversation: Arc<ConversationStore<C>>,
    social: Arc<SocialStore<C>>,
    groups: Arc<GroupStore<C>>,
    theme: ThemeStore,
    router: Router<C>,
}

impl GossipClient<WsConnector> {
    /// Client talking WebSocket to `config.server.origin`.
    pub fn websocket(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::new(config, WsConnector::new(), storage)
    }
}

impl<C: Connector> GossipClient<C> {
    /// Wire a client from its parts.
    pub fn new(config: ClientConfig, connector: C, storage: Arc<dyn KeyValueStore>) -> Self {
        let notifier = Notifier::default();
        let provider = Arc::new(ChannelProvider::new(
            connector,
            config.server.origin.clone(),
            config.request_timeout(),
        ));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&provider),
            Arc::clone(&storage),
            notifier.clone(),
            config.resend_cooldown(),
        ));
        let shared = session.shared();
        let conversation = Arc::new(ConversationStore::new(
            Arc::clone(&provider),
            Arc::clone(&shared),
            notifier.clone(),
        ));
        let social = Arc::new(SocialStore::new(
            Arc::clone(&provider),
            Arc::clone(&shared),
            notifier.clone(),
            config.hydration_concurrency(),
        ));
        let groups = Arc::new(GroupStore::new(
            Arc::clone(&provider),
            shared,
            notifier.clone(),
        ));
        let router = Router::new(
            Arc::clone(&session),
            Arc::clone(&conversation),
            Arc::clone(&social),
            Arc::clone(&groups),
        );
        let theme = ThemeStore::new(storage, notifier.clone());

        Self {
            config,
            provider,
            notifier,
            session,
            conversation,
            social,
            groups,
            theme,
            router,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribe to UI events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<UiEvent> {
        self.notifier.subscribe()
    }

    /// Session manager.
    pub fn session(&self) -> &SessionManager<C> {
        &self.session
    }

    /// Conversation store.
    pub fn conversation(&self) -> &ConversationStore<C> {
        &self.conversation
    }

    /// Social graph store.
    pub fn social(&self) -> &SocialStore<C> {
        &self.social
    }

    /// Group store.
    pub fn groups(&self) -> &GroupStore<C> {
        &self.groups
    }

    /// Push router.
    pub fn router(&self) -> &Router<C> {
        &self.router
    }

    // --- Session ---

    /// Restore the session from the persisted token, if any.
    pub async fn restore_session(&self) -> Result<Option<Identity>, ClientError> {
        let result = self.session.restore_session().await;
        if let Ok(Some(_)) = &result {
            self.router.subscribe_session().await;
        }
        self.settle(result).await
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let result = self.session.login(email, password).await;
        if result.is_ok() {
            self.router.subscribe_session().await;
        }
        self.settle(result).await
    }

    /// Create an account.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserId, ClientError> {
        self.session.register(name, email, password).await
    }

    /// Verify a registration OTP and start the session.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Identity, ClientError> {
        let result = self.session.verify_otp(email, otp).await;
        if result.is_ok() {
            self.router.subscribe_session().await;
        }
        self.settle(result).await
    }

    /// Request a password-reset OTP.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ClientError> {
        self.session.forgot_password(email).await
    }

    /// Check a password-reset OTP.
    pub async fn verify_reset_otp(&self, email: &str, otp: &str) -> Result<(), ClientError> {
        self.session.verify_reset_otp(email, otp).await
    }

    /// Set a new password.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), ClientError> {
        self.session.reset_password(email, new_password).await
    }

    /// Ask for another OTP email.
    pub async fn resend_otp(&self, email: &str) -> Result<(), ClientError> {
        self.session.resend_otp(email).await
    }

    /// Log out and forget all per-session state.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.session.logout().await;
        self.router.teardown().await;
        result
    }

    /// Change own name and/or avatar.
    pub async fn update_profile(
        &self,
        name: Option<String>,
        profile_pic: Option<String>,
    ) -> Result<Identity, ClientError> {
        let result = self.session.update_profile(name, profile_pic).await;
        self.settle(result).await
    }

    /// Refresh the online friends listing.
    pub async fn load_online_friends(&self) -> Result<Vec<User>, ClientError> {
        let result = self.session.load_online_friends().await;
        self.settle(result).await
    }

    // --- Conversations ---

    /// Select a direct conversation and load its history.
    pub async fn open_peer(&self, peer: UserId) -> Result<(), ClientError> {
        self.conversation.select_peer(peer).await;
        self.router.subscribe_conversation().await;
        let result = self.conversation.fetch_messages().await.map(|_| ());
        self.settle(result).await
    }

    /// Select a group conversation and load its history.
    pub async fn open_group(&self, group: GroupId) -> Result<(), ClientError> {
        self.conversation.select_group(group).await;
        self.router.subscribe_conversation().await;
        let result = self.conversation.fetch_messages().await.map(|_| ());
        self.settle(result).await
    }

    /// Deselect the active conversation.
    pub async fn close_conversation(&self) {
        self.conversation.clear_selection().await;
    }

    /// Send to the selected conversation and update its listing preview.
    pub async fn send_message(&self, body: MessageBody) -> Result<Message, ClientError> {
        let result = self.conversation.send_message(body).await;
        if let Ok(message) = &result {
            match message.target() {
                Some(MessageTarget::Group(_)) => self.groups.record_message(message).await,
                Some(MessageTarget::Peer(_)) => self.social.record_message(message).await,
                None => debug!("confirmed message has no target"),
            }
        }
        self.settle(result).await
    }

    /// Delete the direct history with `other`.
    pub async fn delete_all_chats(&self, other: &UserId) -> Result<(), ClientError> {
        let result = self.conversation.delete_all_chats(other).await;
        self.settle(result).await
    }

    // --- Social ---

    /// Refresh the friend listing.
    pub async fn load_friends(&self) -> Result<Vec<User>, ClientError> {
        let result = self.social.load_friends().await;
        self.settle(result).await
    }

    /// Refresh the user directory.
    pub async fn load_users(&self) -> Result<Vec<User>, ClientError> {
        let result = self.social.load_users().await;
        self.settle(result).await
    }

    /// Refresh pending friend requests.
    pub async fn load_requests(&self) -> Result<(), ClientError> {
        let result = self.social.load_requests().await;
        self.settle(result).await
    }

    /// Fetch one user record.
    pub async fn lookup_user(&self, user_id: &UserId) -> Result<User, ClientError> {
        let result = self.social.lookup_user(user_id).await;
        self.settle(result).await
    }

    /// Send or withdraw a friend request.
    pub async fn toggle_friend_request(&self, target: &UserId) -> Result<ToggleOutcome, ClientError> {
        let result = self.social.toggle_friend_request(target).await;
        self.settle(result).await
    }

    /// Send a friend request.
    pub async fn send_friend_request(&self, target: &UserId) -> Result<(), ClientError> {
        let result = self.social.send_friend_request(target).await;
        self.settle(result).await
    }

    /// Accept a friend request.
    pub async fn accept_friend_request(&self, requester: &UserId) -> Result<(), ClientError> {
        let result = self.social.accept_friend_request(requester).await;
        self.settle(result).await
    }

    /// Reject a friend request.
    pub async fn reject_friend_request(&self, requester: &UserId) -> Result<(), ClientError> {
        let result = self.social.reject_friend_request(requester).await;
        self.settle(result).await
    }

    /// Withdraw a sent friend request.
    pub async fn cancel_friend_request(&self, target: &UserId) -> Result<(), ClientError> {
        let result = self.social.cancel_friend_request(target).await;
        self.settle(result).await
    }

    /// End a friendship.
    pub async fn unfriend(&self, friend: &UserId) -> Result<(), ClientError> {
        let result = self.social.unfriend(friend).await;
        self.settle(result).await
    }

    /// Block a user.
    pub async fn block_user(&self, other: &UserId) -> Result<(), ClientError> {
        let result = self.social.block_user(other).await;
        self.settle(result).await
    }

    /// Unblock a user.
    pub async fn unblock_user(&self, other: &UserId) -> Result<(), ClientError> {
        let result = self.social.unblock_user(other).await;
        self.settle(result).await
    }

    // --- Groups ---

    /// Refresh the group listing.
    pub async fn load_groups(&self) -> Result<Vec<Group>, ClientError> {
        let result = self.groups.load_groups().await;
        self.settle(result).await
    }

    /// Create a group and return to the listing.
    pub async fn create_group(&self, form: GroupForm) -> Result<Group, ClientError> {
        let result = self.groups.create_group(form).await;
        if result.is_ok() {
            self.close_group_view().await;
        }
        self.settle(result).await
    }

    /// Edit a group and return to the listing.
    pub async fn edit_group(&self, group_id: &GroupId, form: GroupForm) -> Result<Group, ClientError> {
        let result = self.groups.edit_group(group_id, form).await;
        if result.is_ok() {
            self.close_group_view().await;
        }
        self.settle(result).await
    }

    /// Leave a group; a selected group conversation is closed.
    pub async fn leave_group(&self, group_id: &GroupId) -> Result<(), ClientError> {
        let result = self.groups.leave_group(group_id).await;
        if result.is_ok() {
            self.close_group_view().await;
        }
        self.settle(result).await
    }

    /// Deselect the active group and close the group forms; a peer chat stays open.
    async fn close_group_view(&self) {
        if matches!(self.conversation.active().await, Some(ConversationKey::Group(_))) {
            self.conversation.clear_selection().await;
        } else {
            self.conversation.set_group_creation(false).await;
            self.conversation.set_group_edit(false).await;
        }
    }

    // --- Theme ---

    /// Current theme.
    pub async fn theme(&self) -> Result<Theme, ClientError> {
        self.theme.current().await
    }

    /// Persist a theme.
    pub async fn set_theme(&self, theme: Theme) -> Result<(), ClientError> {
        self.theme.set(theme).await
    }

    // --- Push processing ---

    /// Dispatch pushes read while requests were waiting, in delivery order.
    pub async fn process_backlog(&self) -> usize {
        let Some(channel) = self.provider.current().await else {
            return 0;
        };
        let backlog = channel.drain_backlog().await;
        let count = backlog.len();
        for push in backlog {
            self.router.dispatch(push).await;
        }
        count
    }

    /// Read and dispatch one push.
    ///
    /// A failing transport ends the session like a forced logout.
    pub async fn poll_push(&self) -> Result<Dispatch, ClientError> {
        let channel = self
            .provider
            .current()
            .await
            .ok_or(ClientError::NotConnected)?;
        match channel.next_push().await {
            Ok(push) => Ok(self.router.dispatch(push).await),
            Err(e) => {
                let still_current = self
                    .provider
                    .current()
                    .await
                    .is_some_and(|current| Arc::ptr_eq(&current, &channel));
                if still_current {
                    warn!(error = %e, "authenticated channel lost");
                    self.session
                        .terminate(Event::TransportLost {
                            error: e.to_string(),
                        })
                        .await;
                    self.router.teardown().await;
                }
                Err(e)
            }
        }
    }

    /// Dispatch pushes until the session ends.
    pub async fn run(&self) -> Result<(), ClientError> {
        loop {
            match self.poll_push().await? {
                Dispatch::Terminated => return Ok(()),
                Dispatch::Handled | Dispatch::Dropped => {}
            }
        }
    }

    async fn settle<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        self.process_backlog().await;
        result
    }
}
