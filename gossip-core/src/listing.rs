//! Listing previews for contacts and groups.
//!
//! Every message touching an entry updates its `lastMessage`/`lastMessageAt`
//! and the listing is re-sorted most-recent-first. Entries without a
//! timestamp sort last; equal timestamps keep their relative order.

use chrono::{DateTime, Utc};
use gossip_types::{Group, Message, User};

/// An entry that carries a listing preview.
pub trait Listed {
    /// Timestamp of the last message, if any.
    fn last_message_at(&self) -> Option<DateTime<Utc>>;
}

impl Listed for User {
    fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }
}

impl Listed for Group {
    fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }
}

/// Sort most-recent-first, stable, entries without a timestamp last.
pub fn sort_by_recency<T: Listed>(entries: &mut [T]) {
    entries.sort_by(|a, b| b.last_message_at().cmp(&a.last_message_at()));
}

/// Update the preview of whichever user sent or received a direct message.
///
/// Returns whether any entry changed. Group messages are ignored.
pub fn record_direct(users: &mut [User], message: &Message) -> bool {
    if message.group_id.is_some() {
        return false;
    }
    let mut touched = false;
    for user in users.iter_mut() {
        let involved = user.id == message.sender_id || message.receiver_id.as_ref() == Some(&user.id);
        if involved {
            user.last_message = Some(message.preview());
            user.last_message_at = Some(message.created_at);
            touched = true;
        }
    }
    if touched {
        sort_by_recency(users);
    }
    touched
}

/// Update the preview of the group a message was sent to.
///
/// Returns whether any entry changed.
pub fn record_group(groups: &mut [Group], message: &Message) -> bool {
    let Some(group_id) = &message.group_id else {
        return false;
    };
    let mut touched = false;
    for group in groups.iter_mut().filter(|g| &g.id == group_id) {
        group.last_message = Some(message.preview());
        group.last_message_at = Some(message.created_at);
        group.last_message_sender = Some(message.sender_id.clone());
        touched = true;
    }
    if touched {
        sort_by_recency(groups);
    }
    touched
}
