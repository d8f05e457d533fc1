//! UI-facing events.
//!
//! Stores never render anything; they broadcast [`UiEvent`]s and the
//! presentation layer re-reads snapshots when a topic changes.

use gossip_core::Notice;
use gossip_types::{GroupId, Message, UserId};
use tokio::sync::broadcast;

use crate::error::ClientError;

/// Part of the client state that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Identity or lifecycle state
    Session,
    /// Presence roster or online friends
    Roster,
    /// Selection, view flags or buffer
    Conversation,
    /// Friend listing
    Friends,
    /// Pending friend requests
    Requests,
    /// Blocklist
    Blocklist,
    /// User directory
    Users,
    /// Group listing
    Groups,
    /// Theme preference
    Theme,
}

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Show a transient notice.
    Notice(Notice),
    /// A message arrived for a conversation that is not on screen.
    ///
    /// Drives the notification sound and the OS notification.
    IncomingMessage {
        /// Author
        from: UserId,
        /// Group, for group messages
        group: Option<GroupId>,
        /// Notification body
        preview: String,
    },
    /// State under a topic changed.
    Changed(Topic),
}

impl UiEvent {
    /// Notification for a message that did not land in the visible buffer.
    pub fn incoming(message: &Message) -> Self {
        let preview = match message.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => "Sent a file".to_string(),
        };
        UiEvent::IncomingMessage {
            from: message.sender_id.clone(),
            group: message.group_id.clone(),
            preview,
        }
    }
}

/// Broadcasts [`UiEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<UiEvent>,
}

impl Notifier {
    /// Create a notifier that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is fine.
    pub fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit a notice.
    pub fn notice(&self, notice: Notice) {
        self.emit(UiEvent::Notice(notice));
    }

    /// Emit a change notification.
    pub fn changed(&self, topic: Topic) {
        self.emit(UiEvent::Changed(topic));
    }

    /// Emit an error notice for a failed operation.
    ///
    /// A terminated session has already announced itself.
    pub fn failure(&self, error: &ClientError) {
        if !matches!(error, ClientError::SessionTerminated) {
            self.notice(Notice::error(error.to_string()));
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}
