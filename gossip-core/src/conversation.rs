//! Active conversation selection and its message buffer.
//!
//! At most one conversation (a peer or a group) is selected at a time, and
//! the buffer only ever holds messages of that conversation:
//! - selecting clears the buffer synchronously and bumps an epoch
//! - history fetches are fenced by a [`FetchTicket`]; a response whose ticket
//!   no longer matches the selection is discarded
//! - messages are only appended after the server confirmed them
//!
//! Display order is arrival order. No reordering by timestamp is done.

use gossip_types::{GroupId, Message, UserId};

/// Identifies a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    /// Direct conversation with a user
    Peer(UserId),
    /// Group conversation
    Group(GroupId),
}

impl ConversationKey {
    /// Whether `message` belongs to this conversation, seen from `self_id`.
    pub fn contains(&self, message: &Message, self_id: &UserId) -> bool {
        match self {
            ConversationKey::Peer(peer) => message.is_between(self_id, peer),
            ConversationKey::Group(group) => message.group_id.as_ref() == Some(group),
        }
    }
}

/// Auxiliary panels that are reset on every selection change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewFlags {
    /// Conversation info panel open
    pub show_info: bool,
    /// Group creation panel open
    pub group_creation: bool,
    /// Group edit panel open
    pub group_edit: bool,
}

/// Proof that a history request was issued for a particular selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: ConversationKey,
    epoch: u64,
}

impl FetchTicket {
    /// Conversation the history was requested for.
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }
}

/// Where an inbound message went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Appended to the visible buffer.
    Appended,
    /// Belongs to another conversation; the buffer is untouched.
    Background,
}

/// Selection, view flags and buffer.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    active: Option<ConversationKey>,
    flags: ViewFlags,
    messages: Vec<Message>,
    epoch: u64,
    loading: bool,
}

impl ConversationState {
    /// Create an empty state with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected conversation.
    pub fn active(&self) -> Option<&ConversationKey> {
        self.active.as_ref()
    }

    /// Selected peer, if a direct conversation is active.
    pub fn active_peer(&self) -> Option<&UserId> {
        match &self.active {
            Some(ConversationKey::Peer(peer)) => Some(peer),
            _ => None,
        }
    }

    /// Selected group, if a group conversation is active.
    pub fn active_group(&self) -> Option<&GroupId> {
        match &self.active {
            Some(ConversationKey::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Buffered messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current view flags.
    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    /// Whether a history fetch for the current selection is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Select a direct conversation.
    pub fn select_peer(&mut self, peer: UserId) {
        self.reselect(Some(ConversationKey::Peer(peer)));
    }

    /// Select a group conversation.
    pub fn select_group(&mut self, group: GroupId) {
        self.reselect(Some(ConversationKey::Group(group)));
    }

    /// Deselect whatever is active.
    pub fn clear_selection(&mut self) {
        self.reselect(None);
    }

    fn reselect(&mut self, key: Option<ConversationKey>) {
        self.active = key;
        self.flags = ViewFlags::default();
        self.messages.clear();
        self.loading = false;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Open or close the info panel.
    pub fn set_show_info(&mut self, open: bool) {
        self.flags.show_info = open;
    }

    /// Open or close the group creation panel.
    pub fn set_group_creation(&mut self, open: bool) {
        self.flags.group_creation = open;
    }

    /// Open or close the group edit panel.
    pub fn set_group_edit(&mut self, open: bool) {
        self.flags.group_edit = open;
    }

    /// Start a history fetch for the current selection.
    ///
    /// Returns `None` when nothing is selected.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let key = self.active.clone()?;
        self.loading = true;
        Some(FetchTicket {
            key,
            epoch: self.epoch,
        })
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch && self.active.as_ref() == Some(&ticket.key)
    }

    /// Replace the buffer with a fetched history.
    ///
    /// Returns `false` and leaves the buffer alone when the selection changed
    /// since the ticket was issued.
    pub fn apply_history(&mut self, ticket: &FetchTicket, history: Vec<Message>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.messages = history;
        self.loading = false;
        true
    }

    /// A fetch failed; stop showing it as loading if it is still current.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) {
        if self.is_current(ticket) {
            self.loading = false;
        }
    }

    /// Append a send acknowledged by the server.
    ///
    /// `sent_from` is the selection at send time; nothing is appended if the
    /// user has moved on, since the next fetch will include it.
    pub fn apply_confirmed(&mut self, sent_from: &ConversationKey, message: Message) -> bool {
        if self.active.as_ref() != Some(sent_from) {
            return false;
        }
        self.append(message)
    }

    /// Route an inbound message push.
    pub fn receive(&mut self, message: Message, self_id: &UserId) -> Delivery {
        match &self.active {
            Some(key) if key.contains(&message, self_id) => {
                self.append(message);
                Delivery::Appended
            }
            _ => Delivery::Background,
        }
    }

    /// Empty the buffer if the direct conversation with `other` is selected.
    pub fn clear_pair(&mut self, other: &UserId) -> bool {
        if self.active_peer() != Some(other) {
            return false;
        }
        self.messages.clear();
        true
    }

    fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gossip_types::MessageId;

    fn direct(id: &str, from: &str, to: &str) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: from.into(),
            receiver_id: Some(to.into()),
            group_id: None,
            text: Some(format!("msg {id}")),
            file: None,
            file_type: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn in_group(id: &str, from: &str, group: &str) -> Message {
        Message {
            receiver_id: None,
            group_id: Some(group.into()),
            ..direct(id, from, "")
        }
    }

    fn me() -> UserId {
        UserId::from("alice")
    }

    #[test]
    fn selection_is_exclusive() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        assert!(state.active_peer().is_some() && state.active_group().is_none());

        state.select_group("g1".into());
        assert!(state.active_peer().is_none() && state.active_group().is_some());

        state.select_peer("carol".into());
        assert_eq!(state.active_peer(), Some(&UserId::from("carol")));
        assert!(state.active_group().is_none());
    }

    #[test]
    fn selecting_resets_flags_and_buffer() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        let ticket = state.begin_fetch().unwrap();
        state.apply_history(&ticket, vec![direct("m1", "bob", "alice")]);
        state.set_show_info(true);
        state.set_group_edit(true);

        state.select_peer("carol".into());

        assert_eq!(state.flags(), ViewFlags::default());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn fetch_without_selection_is_refused() {
        let mut state = ConversationState::new();
        assert!(state.begin_fetch().is_none());
    }

    #[test]
    fn history_replaces_buffer() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        let ticket = state.begin_fetch().unwrap();
        assert!(state.is_loading());

        assert!(state.apply_history(
            &ticket,
            vec![direct("m1", "bob", "alice"), direct("m2", "alice", "bob")]
        ));
        assert_eq!(state.messages().len(), 2);
        assert!(!state.is_loading());

        let ticket = state.begin_fetch().unwrap();
        state.apply_history(&ticket, vec![direct("m3", "bob", "alice")]);
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn stale_fetch_after_rapid_switch_is_discarded() {
        let mut state = ConversationState::new();
        state.select_peer("p".into());
        let for_p = state.begin_fetch().unwrap();
        state.select_peer("q".into());
        let for_q = state.begin_fetch().unwrap();

        assert!(state.apply_history(&for_q, vec![direct("q1", "q", "alice")]));
        assert!(!state.apply_history(&for_p, vec![direct("p1", "p", "alice")]));

        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].id, MessageId::new("q1"));
    }

    #[test]
    fn reselecting_same_peer_fences_older_fetch() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        let first = state.begin_fetch().unwrap();
        state.select_peer("bob".into());

        assert!(!state.apply_history(&first, vec![direct("m1", "bob", "alice")]));
    }

    #[test]
    fn confirmed_send_appends_once_for_same_selection() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        let key = state.active().cloned().unwrap();

        assert!(state.apply_confirmed(&key, direct("m1", "alice", "bob")));
        assert!(!state.apply_confirmed(&key, direct("m1", "alice", "bob")));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn confirmed_send_after_switch_is_not_shown() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        let key = state.active().cloned().unwrap();
        state.select_group("g1".into());

        assert!(!state.apply_confirmed(&key, direct("m1", "alice", "bob")));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn push_for_active_peer_is_appended() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());

        assert_eq!(
            state.receive(direct("m1", "bob", "alice"), &me()),
            Delivery::Appended
        );
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn push_for_other_peer_goes_to_background() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());

        assert_eq!(
            state.receive(direct("m1", "carol", "alice"), &me()),
            Delivery::Background
        );
        assert!(state.messages().is_empty());
    }

    #[test]
    fn group_push_matches_by_group_id() {
        let mut state = ConversationState::new();
        state.select_group("g1".into());

        assert_eq!(
            state.receive(in_group("m1", "bob", "g1"), &me()),
            Delivery::Appended
        );
        assert_eq!(
            state.receive(in_group("m2", "bob", "g2"), &me()),
            Delivery::Background
        );
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn direct_push_never_lands_in_group_buffer() {
        let mut state = ConversationState::new();
        state.select_group("g1".into());
        assert_eq!(
            state.receive(direct("m1", "bob", "alice"), &me()),
            Delivery::Background
        );
    }

    #[test]
    fn nothing_selected_means_background() {
        let mut state = ConversationState::new();
        assert_eq!(
            state.receive(direct("m1", "bob", "alice"), &me()),
            Delivery::Background
        );
    }

    #[test]
    fn clear_pair_only_affects_selected_peer() {
        let mut state = ConversationState::new();
        state.select_peer("bob".into());
        state.receive(direct("m1", "bob", "alice"), &me());

        assert!(!state.clear_pair(&"carol".into()));
        assert_eq!(state.messages().len(), 1);

        assert!(state.clear_pair(&"bob".into()));
        assert!(state.messages().is_empty());
        assert_eq!(state.active_peer(), Some(&UserId::from("bob")));
    }
}
