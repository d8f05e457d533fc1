//! Records exchanged with the Gossip server.
//!
//! Field names follow the backend's JSON (`_id`, camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{GroupId, MessageId, UserId};

/// A user as shown in listings and conversation headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-issued id
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Account email
    #[serde(default)]
    pub email: String,
    /// Avatar as inline data or URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Listing preview text of the most recent message with this user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Listing preview timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user with just an id and a name.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: String::new(),
            profile_pic: None,
            last_message: None,
            last_message_at: None,
        }
    }
}

/// The authenticated user's own identity.
///
/// `token` is present on login and OTP verification responses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The user record
    #[serde(flatten)]
    pub user: User,
    /// Bearer token for long-lived channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Identity {
    /// Own user id.
    pub fn id(&self) -> &UserId {
        &self.user.id
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Kind of an inline attachment (`fileType` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Picture
    Image,
    /// Video clip
    Video,
    /// Audio clip
    Audio,
    /// PDF document
    Pdf,
    /// Any other document
    Document,
    /// Kind this client does not know about
    #[serde(other)]
    Other,
}

impl AttachmentKind {
    /// Upper-case label used in listing previews, e.g. `IMAGE`.
    pub fn label(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "IMAGE",
            AttachmentKind::Video => "VIDEO",
            AttachmentKind::Audio => "AUDIO",
            AttachmentKind::Pdf => "PDF",
            AttachmentKind::Document => "DOCUMENT",
            AttachmentKind::Other => "FILE",
        }
    }
}

/// Where a message was sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    /// Direct message to a user
    Peer(UserId),
    /// Message to a group
    Group(GroupId),
}

/// A server-confirmed message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-issued id
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Author
    pub sender_id: UserId,
    /// Recipient of a direct message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    /// Target group of a group message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline attachment payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Attachment kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<AttachmentKind>,
    /// Server creation time
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Where this message was sent, if the server said.
    pub fn target(&self) -> Option<MessageTarget> {
        if let Some(group_id) = &self.group_id {
            return Some(MessageTarget::Group(group_id.clone()));
        }
        self.receiver_id.clone().map(MessageTarget::Peer)
    }

    /// Whether this is a direct message between `a` and `b` (either direction).
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        if self.group_id.is_some() {
            return false;
        }
        match &self.receiver_id {
            Some(receiver) => {
                (&self.sender_id == a && receiver == b) || (&self.sender_id == b && receiver == a)
            }
            None => false,
        }
    }

    /// Listing preview: the text, or `[KIND]` for attachment-only messages.
    pub fn preview(&self) -> String {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => format!(
                "[{}]",
                self.file_type.unwrap_or(AttachmentKind::Other).label()
            ),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("sender_id", &self.sender_id)
            .field("receiver_id", &self.receiver_id)
            .field("group_id", &self.group_id)
            .field("text", &self.text)
            .field(
                "file",
                &self.file.as_ref().map(|f| format!("[{} bytes]", f.len())),
            )
            .field("file_type", &self.file_type)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Outgoing message content, before the server confirms it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    /// Text body
    pub text: Option<String>,
    /// Inline attachment payload, already encoded by the caller
    pub file: Option<String>,
    /// Attachment kind
    pub file_type: Option<AttachmentKind>,
}

impl MessageBody {
    /// A text-only body.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// An attachment-only body.
    pub fn attachment(kind: AttachmentKind, data: impl Into<String>) -> Self {
        Self {
            text: None,
            file: Some(data.into()),
            file_type: Some(kind),
        }
    }

    /// Add a caption to an attachment body.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// True when there is neither text nor an attachment to send.
    pub fn is_empty(&self) -> bool {
        let no_text = self.text.as_deref().map_or(true, |t| t.trim().is_empty());
        let no_file = self.file.as_deref().map_or(true, str::is_empty);
        no_text && no_file
    }
}

/// A group and its listing preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Server-issued id
    #[serde(rename = "_id")]
    pub id: GroupId,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Avatar as inline data or URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Plain members
    #[serde(default)]
    pub members: Vec<UserId>,
    /// Admins (disjoint from members)
    #[serde(default)]
    pub admins: Vec<UserId>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Listing preview text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Listing preview timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Author of the most recent message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_sender: Option<UserId>,
}

impl Group {
    /// Create an empty group with an id and a name.
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            profile_pic: None,
            members: Vec::new(),
            admins: Vec::new(),
            created_at: None,
            last_message: None,
            last_message_at: None,
            last_message_sender: None,
        }
    }

    /// Whether `user` is an admin of this group.
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    /// Whether `user` belongs to this group in any role.
    pub fn includes(&self, user: &UserId) -> bool {
        self.members.contains(user) || self.admins.contains(user)
    }
}

/// Body of `createGroup` and `updateGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    /// Display name, non-empty
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Plain members
    pub members: Vec<UserId>,
    /// Admins, always including the acting user
    pub admins: Vec<UserId>,
    /// Avatar as inline data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_json() -> serde_json::Value {
        json!({
            "_id": "m1",
            "senderId": "alice",
            "receiverId": "bob",
            "text": "hello",
            "createdAt": "2024-05-01T10:00:00Z"
        })
    }

    #[test]
    fn message_decodes_backend_shape() {
        let msg: Message = serde_json::from_value(message_json()).unwrap();
        assert_eq!(msg.id, MessageId::from("m1"));
        assert_eq!(msg.target(), Some(MessageTarget::Peer(UserId::from("bob"))));
        assert_eq!(msg.preview(), "hello");
    }

    #[test]
    fn message_between_is_symmetric() {
        let msg: Message = serde_json::from_value(message_json()).unwrap();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        assert!(msg.is_between(&alice, &bob));
        assert!(msg.is_between(&bob, &alice));
        assert!(!msg.is_between(&alice, &UserId::from("carol")));
    }

    #[test]
    fn group_message_targets_group() {
        let msg: Message = serde_json::from_value(json!({
            "_id": "m2",
            "senderId": "alice",
            "groupId": "g1",
            "file": "data:image/png;base64,AAAA",
            "fileType": "image",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(msg.target(), Some(MessageTarget::Group(GroupId::from("g1"))));
        assert_eq!(msg.preview(), "[IMAGE]");
        assert!(!msg.is_between(&UserId::from("alice"), &UserId::from("bob")));
    }

    #[test]
    fn unknown_attachment_kind_decodes_as_other() {
        let kind: AttachmentKind = serde_json::from_str("\"spreadsheet\"").unwrap();
        assert_eq!(kind, AttachmentKind::Other);
        assert_eq!(kind.label(), "FILE");
    }

    #[test]
    fn message_debug_hides_attachment_payload() {
        let mut msg: Message = serde_json::from_value(message_json()).unwrap();
        msg.file = Some("data:image/png;base64,SECRETSECRET".into());
        let debug = format!("{:?}", msg);
        assert!(!debug.contains("SECRETSECRET"));
    }

    #[test]
    fn identity_flattens_user_and_hides_token() {
        let identity: Identity = serde_json::from_value(json!({
            "_id": "alice",
            "name": "Alice",
            "email": "alice@example.com",
            "token": "tok-123"
        }))
        .unwrap();
        assert_eq!(identity.id(), &UserId::from("alice"));
        assert_eq!(identity.token.as_deref(), Some("tok-123"));
        assert!(!format!("{:?}", identity).contains("tok-123"));
    }

    #[test]
    fn body_emptiness() {
        assert!(MessageBody::default().is_empty());
        assert!(MessageBody::text("   ").is_empty());
        assert!(!MessageBody::text("hi").is_empty());
        assert!(!MessageBody::attachment(AttachmentKind::Pdf, "data:...").is_empty());
        assert!(MessageBody::attachment(AttachmentKind::Pdf, "").is_empty());
    }

    #[test]
    fn group_roles() {
        let mut group = Group::new("g1", "Hikers");
        group.members.push(UserId::from("bob"));
        group.admins.push(UserId::from("alice"));
        assert!(group.is_admin(&UserId::from("alice")));
        assert!(!group.is_admin(&UserId::from("bob")));
        assert!(group.includes(&UserId::from("bob")));
        assert!(!group.includes(&UserId::from("carol")));
    }
}
