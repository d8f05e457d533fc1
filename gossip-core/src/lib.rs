//! # gossip-core
//!
//! Pure logic for the Gossip client (no I/O, instant tests).
//!
//! This crate holds the state machines and data structures behind the
//! client's stores without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure**: they take input and produce
//! output without side effects. The session machine returns [`Action`]s
//! instead of performing them, the conversation buffer hands out
//! [`FetchTicket`]s instead of awaiting responses, and the resend cooldown
//! takes the current instant as a parameter.
//!
//! The actual I/O (channel round trips, persisted token) is performed by
//! `gossip-client`, which interprets what these types produce.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod cooldown;
pub mod error;
pub mod groups;
pub mod listing;
pub mod notice;
pub mod session;
pub mod social;
pub mod theme;

pub use conversation::{ConversationKey, ConversationState, Delivery, FetchTicket, ViewFlags};
pub use cooldown::{CooldownError, ResendCooldown, DEFAULT_RESEND_COOLDOWN};
pub use error::ValidationError;
pub use groups::{GroupDirectory, GroupForm, Role, RoleDraft};
pub use notice::{Notice, NoticeLevel};
pub use session::{Action, Event, Session, SessionState};
pub use social::{Relationship, SocialGraph, ToggleOutcome};
pub use theme::{Theme, ThemeAssets, UnknownTheme};
