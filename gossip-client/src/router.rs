//! Push event routing.
//!
//! [`Subscriptions`] tracks which push kinds are wanted; [`Router`] sends
//! each wanted push to the store that owns it. Dispatch is an exhaustive
//! `match` over [`PushEvent`], so a new server event cannot be forgotten.

use gossip_core::Event;
use gossip_types::{PushEvent, PushKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::conversation::ConversationStore;
use crate::groups::GroupStore;
use crate::session::SessionManager;
use crate::social::SocialStore;
use crate::transport::Connector;

/// Kinds wanted for as long as a session exists.
pub const SESSION_KINDS: [PushKind; 4] = [
    PushKind::OnlineUsers,
    PushKind::ForceLogout,
    PushKind::AuthError,
    PushKind::FriendRequestRejected,
];

/// Kinds re-registered whenever the selection changes.
pub const CONVERSATION_KINDS: [PushKind; 4] = [
    PushKind::NewMessage,
    PushKind::NewGroupMessage,
    PushKind::UserBlocked,
    PushKind::ChatsDeleted,
];

/// Registry of push kinds with an active handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions {
    active: BTreeSet<PushKind>,
}

impl Subscriptions {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind`. Returns `false` if it already was.
    pub fn subscribe(&mut self, kind: PushKind) -> bool {
        self.active.insert(kind)
    }

    /// Unregister `kind`. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, kind: PushKind) -> bool {
        self.active.remove(&kind)
    }

    /// Whether `kind` has a handler.
    pub fn is_subscribed(&self, kind: PushKind) -> bool {
        self.active.contains(&kind)
    }

    /// Registered kinds.
    pub fn active(&self) -> impl Iterator<Item = PushKind> + '_ {
        self.active.iter().copied()
    }

    /// Register the session-wide kinds.
    pub fn subscribe_session(&mut self) {
        for kind in SESSION_KINDS {
            self.unsubscribe(kind);
            self.subscribe(kind);
        }
    }

    /// Re-register the conversation kinds.
    pub fn subscribe_conversation(&mut self) {
        for kind in CONVERSATION_KINDS {
            self.unsubscribe(kind);
            self.subscribe(kind);
        }
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

/// What happened to a dispatched push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A store handled it.
    Handled,
    /// Nobody was subscribed.
    Dropped,
    /// It ended the session.
    Terminated,
}

/// Routes pushes to the owning stores.
pub struct Router<C: Connector> {
    session: Arc<SessionManager<C>>,
    conversation: Arc<ConversationStore<C>>,
    social: Arc<SocialStore<C>>,
    groups: Arc<GroupStore<C>>,
    subscriptions: Mutex<Subscriptions>,
}

impl<C: Connector> Router<C> {
    /// Create a router with no subscriptions.
    pub fn new(
        session: Arc<SessionManager<C>>,
        conversation: Arc<ConversationStore<C>>,
        social: Arc<SocialStore<C>>,
        groups: Arc<GroupStore<C>>,
    ) -> Self {
        Self {
            session,
            conversation,
            social,
            groups,
            subscriptions: Mutex::new(Subscriptions::new()),
        }
    }

    /// Snapshot of the registry.
    pub async fn subscriptions(&self) -> Subscriptions {
        self.subscriptions.lock().await.clone()
    }

    /// Register everything a fresh session needs.
    pub async fn subscribe_session(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.subscribe_session();
        subscriptions.subscribe_conversation();
    }

    /// Re-register the conversation kinds after a selection change.
    pub async fn subscribe_conversation(&self) {
        self.subscriptions.lock().await.subscribe_conversation();
    }

    /// Route one push.
    pub async fn dispatch(&self, push: PushEvent) -> Dispatch {
        let kind = push.kind();
        if !self.subscriptions.lock().await.is_subscribed(kind) {
            debug!(?kind, "no subscriber, dropping push");
            return Dispatch::Dropped;
        }
        debug!(?kind, "dispatching push");

        match push {
            PushEvent::OnlineUsers(ids) => self.session.set_roster(ids).await,
            PushEvent::ForceLogout { message } => {
                info!("server forced logout");
                self.session.terminate(Event::ForcedLogout { message }).await;
                self.teardown().await;
                return Dispatch::Terminated;
            }
            PushEvent::AuthError { message } => {
                info!(detail = ?message, "server rejected session token");
                self.session.terminate(Event::AuthErrorPushed).await;
                self.teardown().await;
                return Dispatch::Terminated;
            }
            PushEvent::NewMessage(message) => {
                self.social.record_message(&message).await;
                self.conversation.on_message(message).await;
            }
            PushEvent::NewGroupMessage(message) => {
                self.groups.record_message(&message).await;
                self.conversation.on_message(message).await;
            }
            PushEvent::UserBlocked { user_id } => {
                self.conversation.on_user_blocked(&user_id).await;
            }
            PushEvent::ChatsDeleted {
                user_id,
                other_user_id,
            } => {
                self.conversation
                    .on_chats_deleted(&user_id, &other_user_id)
                    .await;
            }
            PushEvent::FriendRequestRejected { user_id } => {
                self.social.on_request_rejected(&user_id).await;
            }
        }
        Dispatch::Handled
    }

    /// Forget per-session state in every store and drop all registrations.
    pub async fn teardown(&self) {
        self.subscriptions.lock().await.clear();
        self.conversation.reset().await;
        self.social.reset().await;
        self.groups.reset().await;
    }
}
