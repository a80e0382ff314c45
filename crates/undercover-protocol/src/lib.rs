//! Wire protocol for the undercover game server.
//!
//! This crate defines the language clients and server speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerEvent`], [`RoomSnapshot`],
//!   identity newtypes) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   become bytes and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong in between.
//!
//! The protocol layer knows nothing about rooms or sockets; it only
//! describes messages. The transport underneath is assumed to be a
//! reliable, ordered channel (a WebSocket in practice).

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AdminCommand, ClientMessage, ConnectionId, Description, GameSettings,
    PlayerView, Recipient, Role, RoomCode, RoomSnapshot, RoomStatus,
    ServerEvent, VoteCount, Winners,
};
