//! SocialStore - friends, pending requests and the blocklist.
//!
//! Every mutation waits for the server's acknowledgement. Pending request
//! lists arrive as bare ids and are hydrated with `getUser` lookups, a few at
//! a time and in the server's order.

use futures_util::stream::{self, StreamExt};
use gossip_core::{Notice, Relationship, SocialGraph, ToggleOutcome};
use gossip_types::requests::{
    AcceptFriendRequest, BlockUser, CancelFriendRequest, GetFriendRequests, GetFriends, GetUser,
    GetUsersForSidebar, IdRef, RejectFriendRequest, SendFriendRequest, ToggleFriendRequest,
    UnblockUser, UnfriendUser,
};
use gossip_types::{Call, Message, User, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channel::ChannelProvider;
use crate::error::ClientError;
use crate::notify::{Notifier, Topic};
use crate::session::{require_self, SharedSession};
use crate::transport::Connector;

/// Owns the social graph of the signed-in user.
pub struct SocialStore<C: Connector> {
    provider: Arc<ChannelProvider<C>>,
    session: SharedSession,
    notifier: Notifier,
    graph: Mutex<SocialGraph>,
    concurrency: usize,
}

impl<C: Connector> SocialStore<C> {
    /// Create an empty store hydrating up to `concurrency` users at once.
    pub fn new(
        provider: Arc<ChannelProvider<C>>,
        session: SharedSession,
        notifier: Notifier,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            session,
            notifier,
            graph: Mutex::new(SocialGraph::new()),
            concurrency: concurrency.max(1),
        }
    }

    /// Snapshot of the graph.
    pub async fn snapshot(&self) -> SocialGraph {
        self.graph.lock().await.clone()
    }

    /// Relationship with `other`.
    pub async fn relationship(&self, other: &UserId) -> Relationship {
        self.graph.lock().await.relationship(other)
    }

    /// Whether `other` is blocked.
    pub async fn is_blocked(&self, other: &UserId) -> bool {
        self.graph.lock().await.is_blocked(other)
    }

    /// Refresh the friend listing.
    pub async fn load_friends(&self) -> Result<Vec<User>, ClientError> {
        let user_id = require_self(&self.session).await?;
        let response = self.call(&GetFriends { user_id }).await?;
        let mut graph = self.graph.lock().await;
        graph.set_friends(response.friends);
        let friends = graph.friends().to_vec();
        drop(graph);
        self.notifier.changed(Topic::Friends);
        Ok(friends)
    }

    /// Refresh the sidebar user directory.
    pub async fn load_users(&self) -> Result<Vec<User>, ClientError> {
        let response = self.call(&GetUsersForSidebar {}).await?;
        self.graph.lock().await.set_users(response.users.clone());
        self.notifier.changed(Topic::Users);
        Ok(response.users)
    }

    /// Fetch one user record.
    pub async fn lookup_user(&self, user_id: &UserId) -> Result<User, ClientError> {
        let request = GetUser {
            user_id: user_id.clone(),
        };
        Ok(self.call(&request).await?.user)
    }

    /// Refresh both pending request lists.
    ///
    /// Entries whose lookup fails are left out.
    pub async fn load_requests(&self) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let lists = self.call(&GetFriendRequests { user_id }).await?.requests;

        let received = self.hydrate(lists.incoming).await;
        let sent = self.hydrate(lists.outgoing).await;
        debug!(
            sent = sent.len(),
            received = received.len(),
            "friend requests loaded"
        );

        self.graph.lock().await.set_requests(sent, received);
        self.notifier.changed(Topic::Requests);
        Ok(())
    }

    async fn hydrate(&self, refs: Vec<IdRef>) -> Vec<User> {
        stream::iter(refs)
            .map(|entry| async move {
                let request = GetUser {
                    user_id: entry.id.clone(),
                };
                (entry.id, self.provider.call(&request).await)
            })
            .buffered(self.concurrency)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(response) => Some(response.user),
                    Err(e) => {
                        warn!(user = %id, error = %e, "dropping request entry, lookup failed");
                        None
                    }
                }
            })
            .collect()
            .await
    }

    /// Send or withdraw a request to `target` in one round trip.
    pub async fn toggle_friend_request(&self, target: &UserId) -> Result<ToggleOutcome, ClientError> {
        let from_user_id = require_self(&self.session).await?;
        let request = ToggleFriendRequest {
            from_user_id,
            to_user_id: target.clone(),
        };
        let response = self.call(&request).await?;
        let outcome = ToggleOutcome::from_flags(response.sent, response.cancelled);

        {
            let mut graph = self.graph.lock().await;
            let details = find(graph.users(), target);
            graph.apply_toggle(target, outcome, details);
        }
        match outcome {
            ToggleOutcome::Sent => self.notifier.notice(Notice::success("Friend request sent")),
            ToggleOutcome::Cancelled => {
                self.notifier.notice(Notice::info("Friend request cancelled"))
            }
            ToggleOutcome::Unchanged => debug!(user = %target, "toggle changed nothing"),
        }
        self.notifier.changed(Topic::Requests);
        Ok(outcome)
    }

    /// Send a friend request to `target`.
    pub async fn send_friend_request(&self, target: &UserId) -> Result<(), ClientError> {
        let from_user_id = require_self(&self.session).await?;
        let request = SendFriendRequest {
            from_user_id,
            to_user_id: target.clone(),
        };
        self.call(&request).await?;
        {
            let mut graph = self.graph.lock().await;
            let user = find(graph.users(), target).unwrap_or_else(|| User::new(target.clone(), ""));
            graph.record_sent(user);
        }
        self.notifier.notice(Notice::success("Friend request sent"));
        self.notifier.changed(Topic::Requests);
        Ok(())
    }

    /// Accept the request from `requester`.
    pub async fn accept_friend_request(&self, requester: &UserId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = AcceptFriendRequest {
            user_id,
            requester_id: requester.clone(),
        };
        self.call(&request).await?;
        {
            let mut graph = self.graph.lock().await;
            let fallback = find(graph.users(), requester);
            graph.accept(requester, fallback);
        }
        self.notifier
            .notice(Notice::success("Friend request accepted"));
        self.notifier.changed(Topic::Requests);
        self.notifier.changed(Topic::Friends);
        Ok(())
    }

    /// Reject the request from `requester`.
    pub async fn reject_friend_request(&self, requester: &UserId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = RejectFriendRequest {
            user_id,
            requester_id: requester.clone(),
        };
        self.call(&request).await?;
        self.graph.lock().await.reject(requester);
        self.notifier
            .notice(Notice::success("Friend request rejected"));
        self.notifier.changed(Topic::Requests);
        Ok(())
    }

    /// Withdraw the request sent to `target`.
    pub async fn cancel_friend_request(&self, target: &UserId) -> Result<(), ClientError> {
        let from_user_id = require_self(&self.session).await?;
        let request = CancelFriendRequest {
            from_user_id,
            to_user_id: target.clone(),
        };
        self.call(&request).await?;
        self.graph.lock().await.cancel(target);
        self.notifier
            .notice(Notice::success("Friend request cancelled"));
        self.notifier.changed(Topic::Requests);
        Ok(())
    }

    /// End the friendship with `friend`.
    pub async fn unfriend(&self, friend: &UserId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = UnfriendUser {
            user_id,
            friend_id: friend.clone(),
        };
        self.call(&request).await?;
        self.graph.lock().await.unfriend(friend);
        self.notifier.notice(Notice::success("Unfriended successfully"));
        self.notifier.changed(Topic::Friends);
        Ok(())
    }

    /// Block `other`.
    pub async fn block_user(&self, other: &UserId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = BlockUser {
            user_id,
            block_user_id: other.clone(),
        };
        self.call(&request).await?;
        self.graph.lock().await.block(other.clone());
        self.notifier.notice(Notice::success("User blocked"));
        self.notifier.changed(Topic::Blocklist);
        Ok(())
    }

    /// Unblock `other`.
    pub async fn unblock_user(&self, other: &UserId) -> Result<(), ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = UnblockUser {
            user_id,
            unblock_user_id: other.clone(),
        };
        self.call(&request).await?;
        self.graph.lock().await.unblock(other);
        self.notifier.notice(Notice::success("User unblocked"));
        self.notifier.changed(Topic::Blocklist);
        Ok(())
    }

    /// `by` rejected a request this user sent.
    pub async fn on_request_rejected(&self, by: &UserId) {
        if self.graph.lock().await.on_request_rejected(by) {
            self.notifier
                .notice(Notice::error("Your friend request was rejected"));
            self.notifier.changed(Topic::Requests);
        }
    }

    /// Update listing previews for a direct message.
    pub async fn record_message(&self, message: &Message) {
        if self.graph.lock().await.record_message(message) {
            self.notifier.changed(Topic::Friends);
        }
    }

    /// Forget everything.
    pub async fn reset(&self) {
        self.graph.lock().await.clear();
    }

    async fn call<R: Call>(&self, request: &R) -> Result<R::Response, ClientError> {
        self.provider.call(request).await.map_err(|e| {
            self.notifier.failure(&e);
            e
        })
    }
}

fn find(users: &[User], id: &UserId) -> Option<User> {
    users.iter().find(|u| &u.id == id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockConnector, MockServer};
    use gossip_core::{Event, Session};
    use gossip_types::Identity;
    use serde_json::json;
    use std::time::Duration;

    async fn store(server: &MockServer) -> SocialStore<MockConnector> {
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
        SocialStore::new(provider, Arc::new(Mutex::new(session)), Notifier::default(), 2)
    }

    fn user_json(id: &str) -> serde_json::Value {
        json!({"user": {"_id": id, "name": id.to_uppercase()}})
    }

    #[tokio::test]
    async fn requests_hydrate_in_order_and_drop_failures() {
        let server = MockServer::new();
        server.script_ok(
            "getFriendRequests",
            json!({"requests": {
                "incoming": [{"_id": "bob"}, {"_id": "ghost"}, {"_id": "carol"}],
                "outgoing": [{"_id": "dave"}]
            }}),
        );
        server.script_ok("getUser", user_json("bob"));
        server.script_err("getUser", "User not found");
        server.script_ok("getUser", user_json("carol"));
        server.script_ok("getUser", user_json("dave"));
        let store = store(&server).await;

        store.load_requests().await.unwrap();

        let graph = store.snapshot().await;
        let received: Vec<&str> = graph
            .received_requests()
            .iter()
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(received, vec!["bob", "carol"]);
        assert_eq!(graph.relationship(&"dave".into()), Relationship::SentPending);
    }

    #[tokio::test]
    async fn toggle_twice_restores_state() {
        let server = MockServer::new();
        server.script_ok("toggleFriendRequest", json!({"sent": true}));
        server.script_ok("toggleFriendRequest", json!({"cancelled": true}));
        let store = store(&server).await;
        let bob = UserId::from("bob");

        assert_eq!(
            store.toggle_friend_request(&bob).await.unwrap(),
            ToggleOutcome::Sent
        );
        assert_eq!(store.relationship(&bob).await, Relationship::SentPending);
        assert_eq!(
            store.toggle_friend_request(&bob).await.unwrap(),
            ToggleOutcome::Cancelled
        );
        assert_eq!(store.relationship(&bob).await, Relationship::None);
    }

    #[tokio::test]
    async fn failed_accept_changes_nothing() {
        let server = MockServer::new();
        server.script_ok(
            "getFriendRequests",
            json!({"requests": {"incoming": [{"_id": "bob"}], "outgoing": []}}),
        );
        server.script_ok("getUser", user_json("bob"));
        server.script_err("acceptFriendRequest", "Request no longer exists");
        let store = store(&server).await;
        store.load_requests().await.unwrap();

        let err = store.accept_friend_request(&"bob".into()).await.unwrap_err();

        assert_eq!(err.to_string(), "Request no longer exists");
        assert_eq!(
            store.relationship(&"bob".into()).await,
            Relationship::ReceivedPending
        );
    }

    #[tokio::test]
    async fn block_and_unblock_follow_acks() {
        let server = MockServer::new();
        server.script_ok("blockUser", json!({}));
        server.script_ok("unblockUser", json!({}));
        let store = store(&server).await;
        let bob = UserId::from("bob");

        store.block_user(&bob).await.unwrap();
        assert!(store.is_blocked(&bob).await);
        store.unblock_user(&bob).await.unwrap();
        assert!(!store.is_blocked(&bob).await);
        assert_eq!(
            server.payloads("blockUser"),
            vec![json!({"userId": "alice", "blockUserId": "bob"})]
        );
    }

    #[tokio::test]
    async fn rejection_push_removes_sent_entry() {
        let server = MockServer::new();
        server.script_ok("sendFriendRequest", json!({}));
        let store = store(&server).await;
        let bob = UserId::from("bob");
        store.send_friend_request(&bob).await.unwrap();

        store.on_request_rejected(&bob).await;

        assert_eq!(store.relationship(&bob).await, Relationship::None);
    }
}
