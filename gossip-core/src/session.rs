//! Session state machine.
//!
//! A pure, side-effect-free state machine for the authentication lifecycle.
//! It takes events as input and produces a new state plus a list of actions
//! to execute.
//!
//! The actual I/O (opening channels, persisting the token) is performed by
//! `gossip-client`, not by this module.

use std::collections::BTreeSet;

use gossip_types::{Identity, User, UserId};

use crate::notice::Notice;

/// Shown when the bootstrap check rejects a stored token.
pub const EXPIRED_NOTICE: &str = "Session expired. Please login again.";
/// Shown when the server pushes an authentication error.
pub const AUTH_ERROR_NOTICE: &str = "Session expired. Logging out...";
/// Shown for a forced logout that carries no message.
pub const FORCED_LOGOUT_NOTICE: &str = "You have been logged out.";

/// Authentication lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No token, no channel, no identity.
    Unauthenticated,
    /// A bootstrap check or credential exchange is in flight.
    Authenticating,
    /// Token accepted; the long-lived channel is open.
    Authenticated {
        /// Own identity, with the token stripped.
        identity: Identity,
    },
}

impl SessionState {
    /// Create a new state machine in the Unauthenticated state.
    pub fn new() -> Self {
        Self::Unauthenticated
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Starting an exchange
            (Self::Unauthenticated, Event::BootstrapStarted)
            | (Self::Unauthenticated, Event::CredentialsSubmitted) => (Self::Authenticating, vec![]),

            // Credential exchange succeeded: persist and go long-lived
            (Self::Authenticating, Event::Verified { identity, token }) => (
                Self::Authenticated {
                    identity: strip_token(identity),
                },
                vec![
                    Action::PersistToken {
                        token: token.clone(),
                    },
                    Action::OpenChannel { token },
                ],
            ),

            // Bootstrap check on an already-open channel
            (Self::Authenticating, Event::Restored { identity }) => (
                Self::Authenticated {
                    identity: strip_token(identity),
                },
                vec![],
            ),

            (Self::Authenticating, Event::Rejected { error }) => {
                (Self::Unauthenticated, vec![Action::Notify(Notice::error(error))])
            }
            (Self::Authenticating, Event::BootstrapFailed) => (
                Self::Unauthenticated,
                teardown(Some(Notice::error(EXPIRED_NOTICE))),
            ),

            (Self::Authenticated { .. }, Event::ProfileUpdated { identity }) => (
                Self::Authenticated {
                    identity: strip_token(identity),
                },
                vec![],
            ),

            // Explicit logout always tears down, whatever the state
            (_, Event::LogoutRequested) => (Self::Unauthenticated, teardown(None)),

            // Nothing to terminate
            (Self::Unauthenticated, Event::ForcedLogout { .. })
            | (Self::Unauthenticated, Event::AuthErrorPushed)
            | (Self::Unauthenticated, Event::TransportLost { .. }) => (Self::Unauthenticated, vec![]),

            // Server-initiated termination overrides anything in flight
            (_, Event::ForcedLogout { message }) => {
                let text = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| FORCED_LOGOUT_NOTICE.to_string());
                (Self::Unauthenticated, teardown(Some(Notice::error(text))))
            }
            (_, Event::AuthErrorPushed) => (
                Self::Unauthenticated,
                teardown(Some(Notice::error(AUTH_ERROR_NOTICE))),
            ),
            (_, Event::TransportLost { error }) => {
                (Self::Unauthenticated, teardown(Some(Notice::error(error))))
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a session exists.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Own identity, when authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity } => Some(identity),
            _ => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_token(mut identity: Identity) -> Identity {
    identity.token = None;
    identity
}

fn teardown(notice: Option<Notice>) -> Vec<Action> {
    let mut actions = vec![Action::CloseChannel, Action::ClearToken, Action::ClearRoster];
    actions.extend(notice.map(Action::Notify));
    actions
}

/// Events in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A stored token is being checked on a fresh channel.
    BootstrapStarted,
    /// Login or OTP verification was sent.
    CredentialsSubmitted,
    /// Credentials accepted; the server issued a token.
    Verified {
        /// Own identity
        identity: Identity,
        /// Bearer token for the long-lived channel
        token: String,
    },
    /// The bootstrap check accepted the stored token.
    Restored {
        /// Own identity
        identity: Identity,
    },
    /// Credentials rejected by the server.
    Rejected {
        /// Server error text, verbatim
        error: String,
    },
    /// The bootstrap check rejected the stored token.
    BootstrapFailed,
    /// Own profile replaced by an acknowledged update.
    ProfileUpdated {
        /// New identity
        identity: Identity,
    },
    /// User asked to log out.
    LogoutRequested,
    /// Server pushed a forced logout.
    ForcedLogout {
        /// Optional server text
        message: Option<String>,
    },
    /// Server pushed an authentication error.
    AuthErrorPushed,
    /// The authenticated transport failed or ended.
    TransportLost {
        /// Description of the failure
        error: String,
    },
}

/// Actions to be executed by the client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write the token to durable storage.
    PersistToken {
        /// Token to store
        token: String,
    },
    /// Remove the token from durable storage.
    ClearToken,
    /// Open the long-lived authenticated channel.
    OpenChannel {
        /// Token for the handshake
        token: String,
    },
    /// Close the long-lived channel, if any.
    CloseChannel,
    /// Forget presence information.
    ClearRoster,
    /// Show a notice to the user.
    Notify(Notice),
}

/// Session state plus presence and registration bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    roster: BTreeSet<UserId>,
    online_friends: Vec<User>,
    pending_user_id: Option<UserId>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event through the state machine.
    ///
    /// `ClearRoster` is applied here; the remaining actions are returned
    /// for the caller to execute.
    pub fn apply(&mut self, event: Event) -> Vec<Action> {
        let state = std::mem::take(&mut self.state);
        let (state, actions) = state.on_event(event);
        self.state = state;
        if actions.contains(&Action::ClearRoster) {
            self.clear_presence();
        }
        actions
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Own identity, when authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    /// Own user id, when authenticated.
    pub fn self_id(&self) -> Option<&UserId> {
        self.identity().map(Identity::id)
    }

    /// Replace the roster with the server's list of connected users.
    pub fn set_roster(&mut self, ids: impl IntoIterator<Item = UserId>) {
        self.roster = ids.into_iter().collect();
    }

    /// Currently connected users.
    pub fn roster(&self) -> &BTreeSet<UserId> {
        &self.roster
    }

    /// Whether `user` is currently connected.
    pub fn is_online(&self, user: &UserId) -> bool {
        self.roster.contains(user)
    }

    /// Replace the online friends listing.
    pub fn set_online_friends(&mut self, friends: Vec<User>) {
        self.online_friends = friends;
    }

    /// Friends that were online at the last listing.
    pub fn online_friends(&self) -> &[User] {
        &self.online_friends
    }

    /// Remember the account awaiting OTP verification.
    pub fn set_pending_user(&mut self, id: Option<UserId>) {
        self.pending_user_id = id;
    }

    /// Account awaiting OTP verification.
    pub fn pending_user(&self) -> Option<&UserId> {
        self.pending_user_id.as_ref()
    }

    fn clear_presence(&mut self) {
        self.roster.clear();
        self.online_friends.clear();
    }
}
