//! Typed request/acknowledgement pairs.
//!
//! Each request body implements [`Call`], which names the event the server
//! listens on and the shape of a successful acknowledgement. Event names and
//! field names are the backend's.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AttachmentKind, Group, GroupId, GroupPayload, Identity, Message, User, UserId};

/// A request the server answers with exactly one acknowledgement.
pub trait Call: Serialize + Send + Sync {
    /// Event name on the wire.
    const EVENT: &'static str;
    /// Fields of a successful acknowledgement.
    type Response: DeserializeOwned + Send;
}

macro_rules! call {
    ($request:ty => $event:literal, $response:ty) => {
        impl Call for $request {
            const EVENT: &'static str = $event;
            type Response = $response;
        }
    };
}

// --- Responses ---

/// Acknowledgement with no fields beyond `success`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Empty {}

/// Carries the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    /// Own identity, with a token on login/verify
    pub user: Identity,
}

/// Registration accepted; an OTP was emailed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Id of the not-yet-verified account
    pub user_id: UserId,
}

/// A single user record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserResponse {
    /// The user
    pub user: User,
}

/// A list of users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UsersResponse {
    /// The users
    #[serde(default)]
    pub users: Vec<User>,
}

/// A list of friends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FriendsResponse {
    /// The friends
    #[serde(default)]
    pub friends: Vec<User>,
}

/// Full conversation history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryResponse {
    /// The messages, already decrypted by the server
    #[serde(rename = "decryptedMessages", default)]
    pub messages: Vec<Message>,
}

/// The server-confirmed copy of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    /// The confirmed message
    pub message: Message,
}

/// A list of groups.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupsResponse {
    /// The groups
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// A single group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupResponse {
    /// The group
    pub group: Group,
}

/// Reference to a user by id only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdRef {
    /// The user id
    #[serde(rename = "_id")]
    pub id: UserId,
}

/// Pending friend requests in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestLists {
    /// Requests other users sent to this user
    #[serde(default)]
    pub incoming: Vec<IdRef>,
    /// Requests this user sent
    #[serde(default)]
    pub outgoing: Vec<IdRef>,
}

/// Id-only pending request lists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FriendRequestsResponse {
    /// The lists
    #[serde(default)]
    pub requests: RequestLists,
}

/// What a toggle did on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ToggleResponse {
    /// A new request was sent
    #[serde(default)]
    pub sent: bool,
    /// An existing request was cancelled
    #[serde(default)]
    pub cancelled: bool,
}

/// Plain payload: camelCase fields, all required.
macro_rules! request {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $ty:ty),* $(,)? } => $event:literal, $response:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize)]
        #[serde(rename_all = "camelCase")]
        #[allow(missing_docs)]
        pub struct $name {
            $(pub $field: $ty,)*
        }
        call!($name => $event, $response);
    };
}

// --- Session ---

/// Bootstrap check of the channel's token.
#[derive(Debug, Clone, Serialize)]
pub struct CheckAuth;
call!(CheckAuth => "checkAuth", AuthResponse);

request!(
    /// Create an account; the server emails an OTP.
    Register { name: String, email: String, password: String } => "register", RegisterResponse
);
request!(
    /// Confirm registration with the emailed OTP.
    VerifyOtp { email: String, otp: String } => "verifyOtp", AuthResponse
);
request!(
    /// Exchange credentials for an identity and token.
    Login { email: String, password: String } => "login", AuthResponse
);
request!(
    /// End the session server-side.
    Logout {} => "logout", Empty
);
request!(
    /// Ask for a password-reset OTP.
    ForgotPassword { email: String } => "forgotPassword", Empty
);
request!(
    /// Check a password-reset OTP.
    VerifyResetOtp { email: String, otp: String } => "verifyResetOtp", Empty
);
request!(
    /// Set a new password after a verified reset OTP.
    ResetPassword { email: String, new_password: String } => "resetPassword", Empty
);
request!(
    /// Email a fresh OTP.
    ResendOtp { email: String } => "resendOtp", Empty
);

/// Change own name or avatar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    /// Own id
    pub user_id: UserId,
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New avatar, already re-encoded by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}
call!(UpdateProfile => "update", AuthResponse);

request!(
    /// Friends that are currently connected.
    GetOnlineFriends {} => "getOnlineFriends", FriendsResponse
);

// --- Users and friends ---
//
// `user_id` / `from_user_id` is always the caller's own id.

request!(
    /// Directory of users for the sidebar.
    GetUsersForSidebar {} => "getUsersForSidebar", UsersResponse
);
request!(
    /// Details of one user.
    GetUser { user_id: UserId } => "getUser", UserResponse
);
request!(
    /// Own friend list.
    GetFriends { user_id: UserId } => "getFriends", FriendsResponse
);
request!(
    /// Pending requests in both directions, ids only.
    GetFriendRequests { user_id: UserId } => "getFriendRequests", FriendRequestsResponse
);
request!(
    /// Send a friend request, or cancel the pending one.
    ToggleFriendRequest { from_user_id: UserId, to_user_id: UserId } => "toggleFriendRequest", ToggleResponse
);
request!(
    /// Send a friend request.
    SendFriendRequest { from_user_id: UserId, to_user_id: UserId } => "sendFriendRequest", Empty
);
request!(
    /// Accept a received request.
    AcceptFriendRequest { user_id: UserId, requester_id: UserId } => "acceptFriendRequest", Empty
);
request!(
    /// Reject a received request.
    RejectFriendRequest { user_id: UserId, requester_id: UserId } => "rejectFriendRequest", Empty
);
request!(
    /// Withdraw a sent request.
    CancelFriendRequest { from_user_id: UserId, to_user_id: UserId } => "cancelFriendRequest", Empty
);
request!(
    /// End a friendship.
    UnfriendUser { user_id: UserId, friend_id: UserId } => "unfriendUser", Empty
);
request!(
    /// Block a user.
    BlockUser { user_id: UserId, block_user_id: UserId } => "blockUser", Empty
);
request!(
    /// Unblock a user.
    UnblockUser { user_id: UserId, unblock_user_id: UserId } => "unblockUser", Empty
);

// --- Direct messages ---

request!(
    /// Full history between the caller (`sender_id`) and a peer.
    GetMessages { sender_id: UserId, receiver_id: UserId } => "getMessages", HistoryResponse
);

/// Send a direct message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Text body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Attachment kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<AttachmentKind>,
    /// Own id
    pub sender_id: UserId,
    /// Peer
    pub receiver_id: UserId,
}
call!(SendMessage => "sendMessage", MessageResponse);

request!(
    /// Delete the whole history with a peer.
    DeleteAllChats { user_id: UserId, other_user_id: UserId } => "deleteAllChats", Empty
);

// --- Groups ---

request!(
    /// Groups this user belongs to.
    GetGroupsForSidebar { user_id: UserId } => "getGroupsForSidebar", GroupsResponse
);
request!(
    /// Full history of a group.
    GetGroupMessages { group_id: GroupId } => "getGroupMessages", HistoryResponse
);

/// Send a message to a group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupMessage {
    /// Text body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Attachment kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<AttachmentKind>,
    /// The group
    pub group_id: GroupId,
    /// Own id
    pub sender_id: UserId,
}
call!(SendGroupMessage => "sendGroupMessage", MessageResponse);

/// Create a group.
#[derive(Debug, Clone, Serialize)]
pub struct CreateGroup {
    /// Group fields
    #[serde(flatten)]
    pub group: GroupPayload,
}
call!(CreateGroup => "createGroup", GroupResponse);

/// Replace a group's metadata and roles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroup {
    /// The group
    pub group_id: GroupId,
    /// New fields
    #[serde(flatten)]
    pub group: GroupPayload,
}
call!(UpdateGroup => "updateGroup", GroupResponse);

request!(
    /// Leave a group.
    LeaveGroup { group_id: GroupId, user_id: UserId } => "leaveGroup", Empty
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_omits_missing_attachment() {
        let request = SendMessage {
            text: Some("hi".into()),
            file: None,
            file_type: None,
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"text": "hi", "senderId": "alice", "receiverId": "bob"})
        );
        assert_eq!(SendMessage::EVENT, "sendMessage");
    }

    #[test]
    fn update_group_flattens_fields() {
        let request = UpdateGroup {
            group_id: "g1".into(),
            group: GroupPayload {
                name: "Hikers".into(),
                description: String::new(),
                members: vec!["bob".into()],
                admins: vec!["alice".into()],
                profile_pic: None,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["groupId"], json!("g1"));
        assert_eq!(value["admins"], json!(["alice"]));
        assert!(value.get("group").is_none());
    }

    #[test]
    fn check_auth_sends_null_payload() {
        assert_eq!(serde_json::to_value(CheckAuth).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(Logout {}).unwrap(), json!({}));
    }

    #[test]
    fn toggle_response_defaults_to_no_change() {
        let response: ToggleResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!response.sent && !response.cancelled);
    }

    #[test]
    fn friend_requests_decode_id_refs() {
        let response: FriendRequestsResponse = serde_json::from_value(json!({
            "requests": {"incoming": [{"_id": "carol"}], "outgoing": [{"_id": "dave"}]}
        }))
        .unwrap();
        assert_eq!(response.requests.incoming[0].id, UserId::from("carol"));
        assert_eq!(response.requests.outgoing[0].id, UserId::from("dave"));
    }

    #[test]
    fn history_reads_backend_field() {
        let response: HistoryResponse =
            serde_json::from_value(json!({"decryptedMessages": []})).unwrap();
        assert!(response.messages.is_empty());
    }
}
