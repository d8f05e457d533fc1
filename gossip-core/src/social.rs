//! Friend relationships and the blocklist.
//!
//! Each counterpart is in at most one of friends, sent-pending or
//! received-pending. The blocklist is an independent id set and does not
//! touch the friendship state.

use std::collections::BTreeSet;

use gossip_types::{Message, User, UserId};

use crate::listing;

/// Relationship with another user, seen from this user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// No relationship
    None,
    /// This user sent a request that is still pending
    SentPending,
    /// The other user sent a request that is still pending
    ReceivedPending,
    /// Friends
    Friends,
}

/// What the server did with a toggled friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A new request was sent
    Sent,
    /// The pending request was cancelled
    Cancelled,
    /// Neither (the server changed nothing)
    Unchanged,
}

impl ToggleOutcome {
    /// Interpret the server's `sent`/`cancelled` flags.
    pub fn from_flags(sent: bool, cancelled: bool) -> Self {
        match (sent, cancelled) {
            (true, _) => ToggleOutcome::Sent,
            (false, true) => ToggleOutcome::Cancelled,
            (false, false) => ToggleOutcome::Unchanged,
        }
    }
}

/// Friends, pending requests, blocklist and the user directory.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    friends: Vec<User>,
    sent: Vec<User>,
    received: Vec<User>,
    blocked: BTreeSet<UserId>,
    users: Vec<User>,
}

fn position(list: &[User], id: &UserId) -> Option<usize> {
    list.iter().position(|u| &u.id == id)
}

fn remove(list: &mut Vec<User>, id: &UserId) -> Option<User> {
    position(list, id).map(|i| list.remove(i))
}

fn insert(list: &mut Vec<User>, user: User) {
    if position(list, &user.id).is_none() {
        list.push(user);
    }
}

impl SocialGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Friends in listing order.
    pub fn friends(&self) -> &[User] {
        &self.friends
    }

    /// Requests this user sent.
    pub fn sent_requests(&self) -> &[User] {
        &self.sent
    }

    /// Requests other users sent to this user.
    pub fn received_requests(&self) -> &[User] {
        &self.received
    }

    /// Blocked user ids.
    pub fn blocked(&self) -> &BTreeSet<UserId> {
        &self.blocked
    }

    /// Sidebar user directory.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Replace the friend listing.
    pub fn set_friends(&mut self, mut friends: Vec<User>) {
        listing::sort_by_recency(&mut friends);
        for friend in &friends {
            remove(&mut self.sent, &friend.id);
            remove(&mut self.received, &friend.id);
        }
        self.friends = friends;
    }

    /// Replace the user directory.
    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    /// Replace both pending lists.
    ///
    /// A user listed in both directions is kept as received only.
    pub fn set_requests(&mut self, sent: Vec<User>, received: Vec<User>) {
        self.received = Vec::new();
        for user in received {
            insert(&mut self.received, user);
        }
        self.sent = Vec::new();
        for user in sent {
            if position(&self.received, &user.id).is_none() {
                insert(&mut self.sent, user);
            }
        }
    }

    /// Relationship with `other`.
    pub fn relationship(&self, other: &UserId) -> Relationship {
        if position(&self.friends, other).is_some() {
            Relationship::Friends
        } else if position(&self.sent, other).is_some() {
            Relationship::SentPending
        } else if position(&self.received, other).is_some() {
            Relationship::ReceivedPending
        } else {
            Relationship::None
        }
    }

    /// Whether `other` is on the blocklist.
    pub fn is_blocked(&self, other: &UserId) -> bool {
        self.blocked.contains(other)
    }

    /// Apply the server's answer to a toggle against `target`.
    ///
    /// `details` is used for the new sent entry; a bare id entry is recorded
    /// when it is missing.
    pub fn apply_toggle(&mut self, target: &UserId, outcome: ToggleOutcome, details: Option<User>) {
        match outcome {
            ToggleOutcome::Sent => {
                let user = details.unwrap_or_else(|| User::new(target.clone(), ""));
                self.record_sent(user);
            }
            ToggleOutcome::Cancelled => self.cancel(target),
            ToggleOutcome::Unchanged => {}
        }
    }

    /// Record a request this user sent.
    pub fn record_sent(&mut self, user: User) {
        remove(&mut self.received, &user.id);
        insert(&mut self.sent, user);
    }

    /// The request from `requester` was accepted; the pair are now friends.
    ///
    /// The received entry supplies the friend record; `fallback` is used
    /// when there is none.
    pub fn accept(&mut self, requester: &UserId, fallback: Option<User>) {
        let from_received = remove(&mut self.received, requester);
        let from_sent = remove(&mut self.sent, requester);
        let user = from_received
            .or(fallback)
            .or(from_sent)
            .unwrap_or_else(|| User::new(requester.clone(), ""));
        insert(&mut self.friends, user);
    }

    /// The request from `requester` was rejected by this user.
    pub fn reject(&mut self, requester: &UserId) {
        remove(&mut self.received, requester);
    }

    /// This user withdrew the request to `target`.
    pub fn cancel(&mut self, target: &UserId) {
        remove(&mut self.sent, target);
    }

    /// The counterpart rejected a request this user sent.
    pub fn on_request_rejected(&mut self, by: &UserId) -> bool {
        remove(&mut self.sent, by).is_some()
    }

    /// The friendship with `friend` ended.
    pub fn unfriend(&mut self, friend: &UserId) {
        remove(&mut self.friends, friend);
    }

    /// Add `other` to the blocklist.
    pub fn block(&mut self, other: UserId) {
        self.blocked.insert(other);
    }

    /// Remove `other` from the blocklist.
    pub fn unblock(&mut self, other: &UserId) {
        self.blocked.remove(other);
    }

    /// Update listing previews for a direct message.
    pub fn record_message(&mut self, message: &Message) -> bool {
        let friends = listing::record_direct(&mut self.friends, message);
        let users = listing::record_direct(&mut self.users, message);
        friends || users
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
