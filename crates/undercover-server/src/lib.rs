//! # undercover-server
//!
//! The session gateway and WebSocket front door for the undercover
//! social deduction game. Clients connect, create or join a room by
//! short code, and play through [`undercover_protocol::ClientMessage`]
//! requests; the [`Gateway`] turns each request into exactly one room
//! operation and broadcasts the resulting deltas to the room.
//!
//! All state lives in process memory and is lost on restart; clients
//! recover from interruptions by rejoining with the same username.

mod error;
mod gateway;
mod server;

pub use error::ServerError;
pub use gateway::{EventSender, Gateway};
pub use server::{UndercoverServer, UndercoverServerBuilder};
