//! Server-initiated push events.
//!
//! Pushes are a closed set: every event the client reacts to is a variant of
//! [`PushEvent`], so dispatch is an exhaustive `match` rather than a lookup
//! by event name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Message, UserId, WireError};

/// All push events the client understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    /// Full presence roster
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<UserId>),
    /// The server terminated this session
    #[serde(rename = "forceLogout")]
    ForceLogout {
        /// Reason shown to the user
        #[serde(default)]
        message: Option<String>,
    },
    /// The bearer token was rejected
    #[serde(rename = "authError")]
    AuthError {
        /// Server-provided detail
        #[serde(default)]
        message: Option<String>,
    },
    /// A direct message involving this user
    #[serde(rename = "newMessage")]
    NewMessage(Message),
    /// A message in one of this user's groups
    #[serde(rename = "newGroupMessage")]
    NewGroupMessage(Message),
    /// The counterpart of a direct conversation blocked this user
    #[serde(rename = "userBlocked")]
    UserBlocked {
        /// The counterpart of the blocked pair
        #[serde(rename = "blockUserId")]
        user_id: UserId,
    },
    /// Direct history between two users was cleared
    #[serde(rename = "chatsDeleted")]
    ChatsDeleted {
        /// User who cleared the history
        #[serde(rename = "userId")]
        user_id: UserId,
        /// The other side of the pair
        #[serde(rename = "otherUserId")]
        other_user_id: UserId,
    },
    /// A friend request this user sent was rejected
    #[serde(rename = "friendRequestRejected")]
    FriendRequestRejected {
        /// User who rejected the request
        #[serde(rename = "userId")]
        user_id: UserId,
    },
}

/// Discriminant of a [`PushEvent`], used for subscription bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushKind {
    /// `getOnlineUsers`
    OnlineUsers,
    /// `forceLogout`
    ForceLogout,
    /// `authError`
    AuthError,
    /// `newMessage`
    NewMessage,
    /// `newGroupMessage`
    NewGroupMessage,
    /// `userBlocked`
    UserBlocked,
    /// `chatsDeleted`
    ChatsDeleted,
    /// `friendRequestRejected`
    FriendRequestRejected,
}

impl PushKind {
    /// Every push kind, in declaration order.
    pub const ALL: [PushKind; 8] = [
        PushKind::OnlineUsers,
        PushKind::ForceLogout,
        PushKind::AuthError,
        PushKind::NewMessage,
        PushKind::NewGroupMessage,
        PushKind::UserBlocked,
        PushKind::ChatsDeleted,
        PushKind::FriendRequestRejected,
    ];

    /// Kinds that end the session when received.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PushKind::ForceLogout | PushKind::AuthError)
    }
}

impl PushEvent {
    /// The discriminant of this event.
    pub fn kind(&self) -> PushKind {
        match self {
            PushEvent::OnlineUsers(_) => PushKind::OnlineUsers,
            PushEvent::ForceLogout { .. } => PushKind::ForceLogout,
            PushEvent::AuthError { .. } => PushKind::AuthError,
            PushEvent::NewMessage(_) => PushKind::NewMessage,
            PushEvent::NewGroupMessage(_) => PushKind::NewGroupMessage,
            PushEvent::UserBlocked { .. } => PushKind::UserBlocked,
            PushEvent::ChatsDeleted { .. } => PushKind::ChatsDeleted,
            PushEvent::FriendRequestRejected { .. } => PushKind::FriendRequestRejected,
        }
    }

    /// Rebuild a typed event from the `event` name and `data` of a push frame.
    pub fn from_parts(event: &str, data: Value) -> Result<Self, WireError> {
        let mut tagged = serde_json::Map::new();
        tagged.insert("event".into(), Value::String(event.to_string()));
        tagged.insert("data".into(), data);
        serde_json::from_value(Value::Object(tagged)).map_err(WireError::Deserialization)
    }

    /// Split this event into the `event` name and `data` of a push frame.
    pub fn into_parts(self) -> Result<(String, Value), WireError> {
        let value = serde_json::to_value(self).map_err(WireError::Serialization)?;
        let Value::Object(mut map) = value else {
            return Err(WireError::InvalidData("push event is not an object".into()));
        };
        let event = match map.remove("event") {
            Some(Value::String(event)) => event,
            _ => return Err(WireError::InvalidData("push event has no name".into())),
        };
        let data = map.remove("data").unwrap_or(Value::Null);
        Ok((event, data))
    }
}
