//! End-to-end client scenarios against the scripted mock server.

use gossip_client::{
    ClientError, Dispatch, GossipClient, KeyValueStore, MemoryStore, MockConnector, MockServer,
    Topic, UiEvent, TOKEN_KEY,
};
use gossip_core::{GroupForm, Relationship, Role, ToggleOutcome};
use gossip_types::{Ack, Frame, GroupId, Handshake, MessageBody, PushEvent, UserId};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn new_client(server: &MockServer) -> (GossipClient<MockConnector>, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let config = gossip_client::ClientConfig::with_origin("http://localhost:7001");
    let client = GossipClient::new(config, server.connector(), storage.clone());
    (client, storage)
}

async fn signed_in(server: &MockServer) -> (GossipClient<MockConnector>, Arc<MemoryStore>) {
    sign_in(server, "alice", "tok-1").await
}

async fn sign_in(
    server: &MockServer,
    id: &str,
    token: &str,
) -> (GossipClient<MockConnector>, Arc<MemoryStore>) {
    let email = format!("{id}@example.com");
    server.script_ok(
        "login",
        json!({"user": {"_id": id, "name": id, "email": email, "token": token}}),
    );
    let (client, storage) = new_client(server);
    client.login(&email, "pw").await.unwrap();
    (client, storage)
}

fn direct(id: &str, from: &str, to: &str) -> Value {
    json!({
        "_id": id,
        "senderId": from,
        "receiverId": to,
        "text": format!("text of {id}"),
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

fn buffer_ids(messages: &[gossip_types::Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.to_string()).collect()
}

// ============================================================================
// Social
// ============================================================================

#[tokio::test]
async fn accepting_a_request_makes_friends() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok(
        "getFriendRequests",
        json!({"requests": {"incoming": [{"_id": "bob"}], "outgoing": []}}),
    );
    server.script_ok("getUser", json!({"user": {"_id": "bob", "name": "Bob"}}));
    server.script_ok("acceptFriendRequest", json!({}));
    let bob = UserId::from("bob");

    client.load_requests().await.unwrap();
    assert_eq!(
        client.social().relationship(&bob).await,
        Relationship::ReceivedPending
    );
    client.accept_friend_request(&bob).await.unwrap();

    let graph = client.social().snapshot().await;
    assert!(graph.received_requests().is_empty());
    assert!(graph.sent_requests().is_empty());
    assert_eq!(graph.friends()[0].name, "Bob");
    assert_eq!(
        server.payloads("acceptFriendRequest"),
        vec![json!({"userId": "alice", "requesterId": "bob"})]
    );
}

#[tokio::test]
async fn rejection_push_updates_sent_requests() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok("toggleFriendRequest", json!({"sent": true}));
    let bob = UserId::from("bob");
    client.toggle_friend_request(&bob).await.unwrap();

    server.push(PushEvent::FriendRequestRejected {
        user_id: bob.clone(),
    });
    assert_eq!(client.poll_push().await.unwrap(), Dispatch::Handled);

    assert_eq!(client.social().relationship(&bob).await, Relationship::None);
}

#[tokio::test]
async fn friend_request_round_trip_reaches_both_sides() {
    let server = MockServer::new();
    let (alice, _) = sign_in(&server, "alice", "tok-a").await;
    let (bob, _) = sign_in(&server, "bob", "tok-b").await;
    let (alice_id, bob_id) = (UserId::from("alice"), UserId::from("bob"));

    // Alice asks
    server.script_ok("toggleFriendRequest", json!({"sent": true}));
    assert_eq!(
        alice.toggle_friend_request(&bob_id).await.unwrap(),
        ToggleOutcome::Sent
    );
    assert_eq!(
        alice.social().relationship(&bob_id).await,
        Relationship::SentPending
    );

    // Bob sees it and accepts
    server.script_ok(
        "getFriendRequests",
        json!({"requests": {"incoming": [{"_id": "alice"}], "outgoing": []}}),
    );
    server.script_ok("getUser", json!({"user": {"_id": "alice", "name": "Alice"}}));
    server.script_ok("acceptFriendRequest", json!({}));
    bob.load_requests().await.unwrap();
    assert_eq!(
        bob.social().relationship(&alice_id).await,
        Relationship::ReceivedPending
    );
    bob.accept_friend_request(&alice_id).await.unwrap();

    // Alice refreshes her listings
    server.script_ok("getFriends", json!({"friends": [{"_id": "bob", "name": "Bob"}]}));
    server.script_ok(
        "getFriendRequests",
        json!({"requests": {"incoming": [], "outgoing": []}}),
    );
    alice.load_friends().await.unwrap();
    alice.load_requests().await.unwrap();

    for (client, other) in [(&alice, &bob_id), (&bob, &alice_id)] {
        let graph = client.social().snapshot().await;
        assert_eq!(client.social().relationship(other).await, Relationship::Friends);
        assert!(graph.sent_requests().is_empty());
        assert!(graph.received_requests().is_empty());
        assert_eq!(graph.friends().len(), 1);
    }
}

// ============================================================================
// Conversations
// ============================================================================

#[tokio::test]
async fn reopening_a_conversation_delivers_once() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok("getFriends", json!({"friends": [{"_id": "bob", "name": "Bob"}]}));
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    client.load_friends().await.unwrap();
    client.open_peer("bob".into()).await.unwrap();
    client.open_peer("bob".into()).await.unwrap();
    let mut events = client.subscribe();

    let message = serde_json::from_value(direct("m1", "bob", "alice")).unwrap();
    server.push(PushEvent::NewMessage(message));
    assert_eq!(client.poll_push().await.unwrap(), Dispatch::Handled);

    assert_eq!(buffer_ids(&client.conversation().messages().await), vec!["m1"]);
    let graph = client.social().snapshot().await;
    assert_eq!(graph.friends()[0].last_message.as_deref(), Some("text of m1"));
    let mut listing_updates = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            UiEvent::Changed(Topic::Friends) => listing_updates += 1,
            UiEvent::IncomingMessage { .. } => panic!("active conversation was notified"),
            _ => {}
        }
    }
    assert_eq!(listing_updates, 1);
}

#[tokio::test]
async fn block_push_clears_counterpart_buffer() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok(
        "getMessages",
        json!({"decryptedMessages": [direct("m1", "bob", "alice")]}),
    );
    client.open_peer("bob".into()).await.unwrap();
    assert_eq!(client.conversation().messages().await.len(), 1);

    server.push(PushEvent::UserBlocked {
        user_id: "bob".into(),
    });
    client.poll_push().await.unwrap();

    assert!(client.conversation().messages().await.is_empty());
}

#[tokio::test]
async fn selection_is_exclusive() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    server.script_ok("getGroupMessages", json!({"decryptedMessages": []}));

    client.open_peer("bob".into()).await.unwrap();
    client.open_group("g1".into()).await.unwrap();

    let snapshot = client.conversation().snapshot().await;
    assert!(snapshot.active_peer().is_none());
    assert_eq!(snapshot.active_group(), Some(&GroupId::from("g1")));
}

#[tokio::test]
async fn send_updates_buffer_and_listing() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok(
        "getFriends",
        json!({"friends": [{"_id": "bob", "name": "Bob"}, {"_id": "carol", "name": "Carol"}]}),
    );
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    server.script_ok(
        "sendMessage",
        json!({"message": {
            "_id": "m1",
            "senderId": "alice",
            "receiverId": "carol",
            "text": "hello",
            "createdAt": "2024-05-02T09:00:00Z"
        }}),
    );
    client.load_friends().await.unwrap();
    client.open_peer("carol".into()).await.unwrap();

    client.send_message(MessageBody::text("hello")).await.unwrap();

    assert_eq!(buffer_ids(&client.conversation().messages().await), vec!["m1"]);
    let graph = client.social().snapshot().await;
    assert_eq!(graph.friends()[0].id, UserId::from("carol"));
    assert_eq!(graph.friends()[0].last_message.as_deref(), Some("hello"));
}

#[tokio::test]
async fn empty_send_is_rejected_without_network() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    client.open_peer("bob".into()).await.unwrap();

    let err = client
        .send_message(MessageBody::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(server.request_count("sendMessage"), 0);
}

#[tokio::test]
async fn rapid_switch_keeps_latest_history() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.stall_when_idle(true);
    server.script_silent("getMessages");
    server.script_ok(
        "getMessages",
        json!({"decryptedMessages": [direct("q1", "quinn", "alice")]}),
    );
    let conversation = client.conversation();
    conversation.select_peer("pat".into()).await;

    let (stale, _) = tokio::join!(conversation.fetch_messages(), async {
        while server.request_count("getMessages") == 0 {
            tokio::task::yield_now().await;
        }
        conversation.select_peer("quinn".into()).await;
        // The answer for pat arrives only after the switch
        let id = server
            .requests()
            .iter()
            .find(|r| r.event == "getMessages")
            .map(|r| r.id)
            .unwrap();
        let late = Ack::ok(
            id,
            json!({"decryptedMessages": [direct("p1", "pat", "alice")]}),
        );
        server.push_raw(Frame::Ack(late).to_bytes().unwrap());
    });

    assert!(!stale.unwrap());
    assert!(conversation.messages().await.is_empty());
    assert!(conversation.fetch_messages().await.unwrap());
    assert_eq!(buffer_ids(&conversation.messages().await), vec!["q1"]);
}

#[tokio::test]
async fn message_for_other_conversation_only_updates_listing() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    client.open_peer("bob".into()).await.unwrap();
    let mut events = client.subscribe();

    let message = serde_json::from_value(direct("m7", "carol", "alice")).unwrap();
    server.push(PushEvent::NewMessage(message));
    client.poll_push().await.unwrap();

    assert!(client.conversation().messages().await.is_empty());
    let mut notified = false;
    while let Ok(event) = events.try_recv() {
        if let UiEvent::IncomingMessage { from, .. } = event {
            assert_eq!(from, UserId::from("carol"));
            notified = true;
        }
    }
    assert!(notified);
}

// ============================================================================
// Groups
// ============================================================================

#[tokio::test]
async fn editor_stays_admin_and_returns_to_listing() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    let group = json!({"_id": "g1", "name": "Book club", "members": ["bob"], "admins": ["alice"]});
    server.script_ok("getGroupsForSidebar", json!({"groups": [group.clone()]}));
    server.script_ok("getGroupMessages", json!({"decryptedMessages": []}));
    server.script_ok("updateGroup", json!({"group": group.clone()}));
    server.script_ok("getGroupsForSidebar", json!({"groups": [group]}));

    client.load_groups().await.unwrap();
    client.open_group("g1".into()).await.unwrap();
    client.conversation().set_group_edit(true).await;

    let existing = client.groups().get(&"g1".into()).await.unwrap();
    let mut form = GroupForm::from_group(&existing);
    // Cycling the editor from admin back to none must not demote them
    assert_eq!(form.roles.cycle(&"alice".into()), Role::None);
    client.edit_group(&"g1".into(), form).await.unwrap();

    assert_eq!(
        server.payloads("updateGroup"),
        vec![json!({
            "groupId": "g1",
            "name": "Book club",
            "description": "",
            "members": ["bob"],
            "admins": ["alice"]
        })]
    );
    let snapshot = client.conversation().snapshot().await;
    assert!(snapshot.active().is_none());
    assert!(!snapshot.flags().group_edit);
}

#[tokio::test]
async fn creating_a_group_keeps_the_open_peer_chat() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    let group = json!({"_id": "g2", "name": "Hikers", "members": ["bob"], "admins": ["alice"]});
    server.script_ok(
        "getMessages",
        json!({"decryptedMessages": [direct("m1", "bob", "alice")]}),
    );
    server.script_ok("createGroup", json!({"group": group.clone()}));
    server.script_ok("getGroupsForSidebar", json!({"groups": [group]}));

    client.open_peer("bob".into()).await.unwrap();
    client.conversation().set_group_creation(true).await;
    let mut form = GroupForm::named("Hikers");
    form.roles.set("bob".into(), Role::Member);
    client.create_group(form).await.unwrap();

    let snapshot = client.conversation().snapshot().await;
    assert_eq!(snapshot.active_peer(), Some(&UserId::from("bob")));
    assert!(!snapshot.flags().group_creation);
    assert_eq!(buffer_ids(&client.conversation().messages().await), vec!["m1"]);
    assert_eq!(client.groups().groups().await.len(), 1);
}

// ============================================================================
// Session Termination
// ============================================================================

#[tokio::test]
async fn forced_logout_overrides_in_flight_send() {
    let server = MockServer::new();
    let (client, storage) = signed_in(&server).await;
    server.script_ok("getMessages", json!({"decryptedMessages": []}));
    server.script_ok(
        "sendMessage",
        json!({"message": direct("m1", "alice", "bob")}),
    );
    client.open_peer("bob".into()).await.unwrap();
    server.push(PushEvent::OnlineUsers(vec!["bob".into()]));
    client.poll_push().await.unwrap();
    assert!(client.session().snapshot().await.is_online(&"bob".into()));

    server.push(PushEvent::ForceLogout {
        message: Some("Logged in from another device".into()),
    });
    let err = client
        .send_message(MessageBody::text("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionTerminated));
    let session = client.session().snapshot().await;
    assert!(session.identity().is_none());
    assert!(session.roster().is_empty());
    assert!(storage.get(TOKEN_KEY).await.unwrap().is_none());
    assert!(client.conversation().messages().await.is_empty());
    assert_eq!(server.open_connections(), 0);
}

#[tokio::test]
async fn transport_loss_logs_out() {
    let server = MockServer::new();
    let (client, storage) = signed_in(&server).await;

    server.sever();
    assert!(client.run().await.is_err());

    assert!(!client.session().is_authenticated().await);
    assert!(storage.get(TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn run_returns_after_auth_error() {
    let server = MockServer::new();
    let (client, _) = signed_in(&server).await;
    server.push(PushEvent::OnlineUsers(vec!["bob".into()]));
    server.push(PushEvent::AuthError { message: None });

    client.run().await.unwrap();

    assert!(!client.session().is_authenticated().await);
    assert_eq!(
        server.handshakes(),
        vec![
            Handshake::Flow("login".into()),
            Handshake::Token("tok-1".into())
        ]
    );
}

#[tokio::test]
async fn poll_before_login_is_not_connected() {
    let server = MockServer::new();
    let (client, _) = new_client(&server);
    assert!(matches!(
        client.poll_push().await,
        Err(ClientError::NotConnected)
    ));
}
