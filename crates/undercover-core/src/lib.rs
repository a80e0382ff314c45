//! Game engine for the undercover social deduction game.
//!
//! Everything in this crate is synchronous and single-owner: rooms are
//! owned by the [`Registry`], the registry is owned by the gateway, and
//! every operation runs start-to-finish without suspending. Correctness
//! rests on that serialization — there is no persistence and no
//! cross-process coordination.
//!
//! # Key types
//!
//! - [`Registry`] — creates, looks up, and deletes rooms
//! - [`Room`] — one room's lifecycle, turn rotation, and votes
//! - [`roles`] — the role/word assignment engine
//! - [`words`] — the static word-pair catalog
//! - [`VoteTally`] — per-round vote accounting
//! - [`GameError`] — the domain error taxonomy

mod error;
mod registry;
pub mod roles;
mod room;
mod vote;
pub mod words;

pub use error::GameError;
pub use registry::Registry;
pub use room::{
    Admitted, MAX_PLAYERS, MIN_PLAYERS_TO_START, Outbound, Player, Removal,
    Room,
};
pub use vote::VoteTally;
