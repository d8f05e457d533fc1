//! # gossip-types
//!
//! Wire format types for the Gossip realtime messaging client.
//!
//! This crate provides the foundational types used across all Gossip crates:
//! - [`UserId`], [`GroupId`], [`MessageId`], [`RequestId`] - Identity types
//! - [`User`], [`Identity`], [`Message`], [`Group`] - Records exchanged with the server
//! - [`Call`] - Typed request/acknowledgement pairs
//! - [`PushEvent`] - Closed set of server-initiated events
//! - [`Frame`] - The JSON envelope carried by the channel
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod ids;
mod model;
mod push;
pub mod requests;

pub use error::WireError;
pub use frame::{Ack, Frame, Handshake};
pub use ids::{GroupId, MessageId, RequestId, UserId};
pub use model::{
    AttachmentKind, Group, GroupPayload, Identity, Message, MessageBody, MessageTarget, User,
};
pub use push::{PushEvent, PushKind};
pub use requests::Call;
