//! ConversationStore - selection, history and the send path.
//!
//! The buffer only ever holds the selected conversation. History responses
//! are fenced by the ticket taken when the request went out, and sends are
//! appended only after the server acknowledged them.

use gossip_core::{ConversationKey, ConversationState, Delivery, Notice, ValidationError};
use gossip_types::requests::{
    DeleteAllChats, GetGroupMessages, GetMessages, SendGroupMessage, SendMessage,
};
use gossip_types::{GroupId, Message, MessageBody, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::channel::ChannelProvider;
use crate::error::ClientError;
use crate::notify::{Notifier, Topic, UiEvent};
use crate::session::{require_self, SharedSession};
use crate::transport::Connector;

/// Owns the active conversation and its message buffer.
pub struct ConversationStore<C: Connector> {
    provider: Arc<ChannelProvider<C>>,
    session: SharedSession,
    notifier: Notifier,
    state: Mutex<ConversationState>,
}

impl<C: Connector> ConversationStore<C> {
    /// Create a store with nothing selected.
    pub fn new(provider: Arc<ChannelProvider<C>>, session: SharedSession, notifier: Notifier) -> Self {
        Self {
            provider,
            session,
            notifier,
            state: Mutex::new(ConversationState::new()),
        }
    }

    /// Snapshot of selection, flags and buffer.
    pub async fn snapshot(&self) -> ConversationState {
        self.state.lock().await.clone()
    }

    /// Buffered messages of the selected conversation.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages().to_vec()
    }

    /// Selected conversation.
    pub async fn active(&self) -> Option<ConversationKey> {
        self.state.lock().await.active().cloned()
    }

    /// Select a direct conversation; the group selection is cleared.
    pub async fn select_peer(&self, peer: UserId) {
        self.state.lock().await.select_peer(peer);
        self.notifier.changed(Topic::Conversation);
    }

    /// Select a group conversation; the peer selection is cleared.
    pub async fn select_group(&self, group: GroupId) {
        self.state.lock().await.select_group(group);
        self.notifier.changed(Topic::Conversation);
    }

    /// Deselect whatever is active.
    pub async fn clear_selection(&self) {
        self.state.lock().await.clear_selection();
        self.notifier.changed(Topic::Conversation);
    }

    /// Open or close the info panel.
    pub async fn set_show_info(&self, open: bool) {
        self.state.lock().await.set_show_info(open);
        self.notifier.changed(Topic::Conversation);
    }

    /// Open or close the group creation panel.
    pub async fn set_group_creation(&self, open: bool) {
        self.state.lock().await.set_group_creation(open);
        self.notifier.changed(Topic::Conversation);
    }

    /// Open or close the group edit panel.
    pub async fn set_group_edit(&self, open: bool) {
        self.state.lock().await.set_group_edit(open);
        self.notifier.changed(Topic::Conversation);
    }

    /// Load the full history of the selected conversation.
    ///
    /// Returns `false` when the selection changed while the request was in
    /// flight and the response was discarded.
    pub async fn fetch_messages(&self) -> Result<bool, ClientError> {
        let self_id = require_self(&self.session).await?;
        let ticket = self
            .state
            .lock()
            .await
            .begin_fetch()
            .ok_or(ClientError::NoConversation)?;

        let result = match ticket.key() {
            ConversationKey::Peer(peer) => self
                .provider
                .call(&GetMessages {
                    sender_id: self_id,
                    receiver_id: peer.clone(),
                })
                .await
                .map(|r| r.messages),
            ConversationKey::Group(group) => self
                .provider
                .call(&GetGroupMessages {
                    group_id: group.clone(),
                })
                .await
                .map(|r| r.messages),
        };

        match result {
            Ok(history) => {
                let count = history.len();
                let applied = self.state.lock().await.apply_history(&ticket, history);
                if applied {
                    debug!(count, "history loaded");
                    self.notifier.changed(Topic::Conversation);
                } else {
                    debug!(key = ?ticket.key(), "discarding stale history");
                }
                Ok(applied)
            }
            Err(e) => {
                self.state.lock().await.fail_fetch(&ticket);
                self.notifier.failure(&e);
                Err(e)
            }
        }
    }

    /// Send a message to the selected conversation.
    ///
    /// Nothing reaches the network when the body is empty. The confirmed
    /// message is appended once the server acknowledged it and returned so
    /// the caller can update listing previews.
    pub async fn send_message(&self, body: MessageBody) -> Result<Message, ClientError> {
        if body.is_empty() {
            let error = ClientError::from(ValidationError::EmptyMessage);
            self.notifier.failure(&error);
            return Err(error);
        }
        let self_id = require_self(&self.session).await?;
        let key = self
            .state
            .lock()
            .await
            .active()
            .cloned()
            .ok_or(ClientError::NoConversation)?;

        let MessageBody {
            text,
            file,
            file_type,
        } = body;
        let text = text.filter(|t| !t.trim().is_empty());
        let file = file.filter(|f| !f.is_empty());
        let file_type = file.as_ref().and(file_type);

        let result = match &key {
            ConversationKey::Peer(peer) => {
                self.provider
                    .call(&SendMessage {
                        text,
                        file,
                        file_type,
                        sender_id: self_id,
                        receiver_id: peer.clone(),
                    })
                    .await
            }
            ConversationKey::Group(group) => {
                self.provider
                    .call(&SendGroupMessage {
                        text,
                        file,
                        file_type,
                        group_id: group.clone(),
                        sender_id: self_id,
                    })
                    .await
            }
        };

        let message = match result {
            Ok(response) => response.message,
            Err(e) => {
                self.notifier.failure(&e);
                return Err(e);
            }
        };
        if self
            .state
            .lock()
            .await
            .apply_confirmed(&key, message.clone())
        {
            self.notifier.changed(Topic::Conversation);
        }
        Ok(message)
    }

    /// Delete the whole direct history with `other`.
    pub async fn delete_all_chats(&self, other: &UserId) -> Result<(), ClientError> {
        let self_id = require_self(&self.session).await?;
        let request = DeleteAllChats {
            user_id: self_id,
            other_user_id: other.clone(),
        };
        if let Err(e) = self.provider.call(&request).await {
            self.notifier.failure(&e);
            return Err(e);
        }
        if self.state.lock().await.clear_pair(other) {
            self.notifier.changed(Topic::Conversation);
        }
        self.notifier.notice(Notice::success("All chats deleted"));
        Ok(())
    }

    /// Route a pushed message.
    ///
    /// Messages outside the visible conversation raise an incoming-message
    /// notification instead of touching the buffer.
    pub async fn on_message(&self, message: Message) -> Delivery {
        let Some(self_id) = self.session.lock().await.self_id().cloned() else {
            return Delivery::Background;
        };
        let notification = (message.sender_id != self_id).then(|| UiEvent::incoming(&message));
        let delivery = self.state.lock().await.receive(message, &self_id);
        match delivery {
            Delivery::Appended => self.notifier.changed(Topic::Conversation),
            Delivery::Background => {
                if let Some(event) = notification {
                    self.notifier.emit(event);
                }
            }
        }
        delivery
    }

    /// The counterpart of a direct conversation blocked this user.
    pub async fn on_user_blocked(&self, other: &UserId) {
        if self.state.lock().await.clear_pair(other) {
            self.notifier.changed(Topic::Conversation);
            self.notifier
                .notice(Notice::error("This user has been blocked"));
        }
    }

    /// Direct history between `user_id` and `other_user_id` was cleared.
    pub async fn on_chats_deleted(&self, user_id: &UserId, other_user_id: &UserId) {
        let Some(self_id) = self.session.lock().await.self_id().cloned() else {
            return;
        };
        let counterpart = if user_id == &self_id {
            other_user_id
        } else {
            user_id
        };
        if self.state.lock().await.clear_pair(counterpart) {
            self.notifier.changed(Topic::Conversation);
            if user_id != &self_id {
                self.notifier
                    .notice(Notice::info("Chats were cleared by the other user"));
            }
        }
    }

    /// Forget the selection and buffer.
    pub async fn reset(&self) {
        self.state.lock().await.clear_selection();
        self.notifier.changed(Topic::Conversation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockConnector, MockServer};
    use gossip_core::{Event, Session};
    use gossip_types::{AttachmentKind, Identity, User};
    use serde_json::json;
    use std::time::Duration;

    async fn store(server: &MockServer) -> ConversationStore<MockConnector> {
        let provider = Arc::new(ChannelProvider::new(
            server.connector(),
            "ws://test",
            Duration::from_secs(10),
        ));
        provider.open("tok").await.unwrap();

        let mut session = Session::new();
        session.apply(Event::BootstrapStarted);
        session.apply(Event::Restored {
            identity: Identity {
                user: User::new("alice", "Alice"),
                token: None,
            },
        });
        ConversationStore::new(provider, Arc::new(Mutex::new(session)), Notifier::default())
    }

    fn message(id: &str, from: &str, to: &str) -> serde_json::Value {
        json!({
            "_id": id,
            "senderId": from,
            "receiverId": to,
            "text": format!("text of {id}"),
            "createdAt": "2024-05-01T10:00:00Z"
        })
    }

    fn decoded(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    // ===========================================
    // Selection
    // ===========================================

    #[tokio::test]
    async fn selecting_group_clears_peer() {
        let server = MockServer::new();
        let store = store(&server).await;

        store.select_peer("bob".into()).await;
        store.set_show_info(true).await;
        store.select_group("g1".into()).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.active_group(), Some(&GroupId::from("g1")));
        assert!(snapshot.active_peer().is_none());
        assert!(!snapshot.flags().show_info);
    }

    #[tokio::test]
    async fn fetch_replaces_buffer() {
        let server = MockServer::new();
        server.script_ok(
            "getMessages",
            json!({"decryptedMessages": [message("m1", "bob", "alice"), message("m2", "alice", "bob")]}),
        );
        let store = store(&server).await;
        store.select_peer("bob".into()).await;

        assert!(store.fetch_messages().await.unwrap());

        let ids: Vec<String> = store
            .messages()
            .await
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(
            server.payloads("getMessages"),
            vec![json!({"senderId": "alice", "receiverId": "bob"})]
        );
    }

    #[tokio::test]
    async fn fetch_without_selection_fails_locally() {
        let server = MockServer::new();
        let store = store(&server).await;

        assert!(matches!(
            store.fetch_messages().await,
            Err(ClientError::NoConversation)
        ));
        assert!(server.requests().is_empty());
    }

    // ===========================================
    // Send Path
    // ===========================================

    #[tokio::test]
    async fn empty_send_never_reaches_network() {
        let server = MockServer::new();
        let store = store(&server).await;
        store.select_peer("bob".into()).await;

        let err = store.send_message(MessageBody::text("   ")).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyMessage)
        ));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn confirmed_send_appends_once() {
        let server = MockServer::new();
        server.script_ok("sendMessage", json!({"message": message("m9", "alice", "bob")}));
        let store = store(&server).await;
        store.select_peer("bob".into()).await;

        let sent = store.send_message(MessageBody::text("hi")).await.unwrap();

        assert_eq!(store.messages().await, vec![sent]);
        assert_eq!(
            server.payloads("sendMessage"),
            vec![json!({"text": "hi", "senderId": "alice", "receiverId": "bob"})]
        );
    }

    #[tokio::test]
    async fn failed_send_leaves_buffer_unchanged() {
        let server = MockServer::new();
        server.script_err("sendMessage", "You cannot message this user");
        let store = store(&server).await;
        store.select_peer("bob".into()).await;

        let err = store.send_message(MessageBody::text("hi")).await.unwrap_err();

        assert_eq!(err.to_string(), "You cannot message this user");
        assert!(store.messages().await.is_empty());
    }

    #[tokio::test]
    async fn group_send_carries_attachment() {
        let server = MockServer::new();
        server.script_ok(
            "sendGroupMessage",
            json!({"message": {
                "_id": "gm1",
                "senderId": "alice",
                "groupId": "g1",
                "file": "data:image/png;base64,AAAA",
                "fileType": "image",
                "createdAt": "2024-05-01T10:00:00Z"
            }}),
        );
        let store = store(&server).await;
        store.select_group("g1".into()).await;

        store
            .send_message(MessageBody::attachment(
                AttachmentKind::Image,
                "data:image/png;base64,AAAA",
            ))
            .await
            .unwrap();

        assert_eq!(store.messages().await.len(), 1);
        assert_eq!(
            server.payloads("sendGroupMessage"),
            vec![json!({
                "file": "data:image/png;base64,AAAA",
                "fileType": "image",
                "groupId": "g1",
                "senderId": "alice"
            })]
        );
    }

    // ===========================================
    // Pushes
    // ===========================================

    #[tokio::test]
    async fn message_for_other_conversation_notifies() {
        let server = MockServer::new();
        let store = store(&server).await;
        let mut rx = store.notifier.subscribe();
        store.select_peer("bob".into()).await;
        let _ = rx.recv().await;

        let delivery = store.on_message(decoded(message("m1", "carol", "alice"))).await;

        assert_eq!(delivery, Delivery::Background);
        assert!(store.messages().await.is_empty());
        assert_eq!(
            rx.recv().await.unwrap(),
            UiEvent::IncomingMessage {
                from: "carol".into(),
                group: None,
                preview: "text of m1".into(),
            }
        );
    }

    #[tokio::test]
    async fn message_for_active_peer_appends() {
        let server = MockServer::new();
        let store = store(&server).await;
        store.select_peer("bob".into()).await;

        let delivery = store.on_message(decoded(message("m1", "bob", "alice"))).await;

        assert_eq!(delivery, Delivery::Appended);
        assert_eq!(store.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn chats_deleted_by_counterpart_clears_buffer() {
        let server = MockServer::new();
        let store = store(&server).await;
        store.select_peer("bob".into()).await;
        store.on_message(decoded(message("m1", "bob", "alice"))).await;

        store
            .on_chats_deleted(&"bob".into(), &"alice".into())
            .await;

        assert!(store.messages().await.is_empty());
    }

    #[tokio::test]
    async fn block_of_other_pair_is_ignored() {
        let server = MockServer::new();
        let store = store(&server).await;
        store.select_peer("bob".into()).await;
        store.on_message(decoded(message("m1", "bob", "alice"))).await;

        store.on_user_blocked(&"carol".into()).await;

        assert_eq!(store.messages().await.len(), 1);
    }
}
