//! Error types for the game engine.

use undercover_protocol::{ConnectionId, RoomCode, RoomStatus};

/// Errors produced by room and registry operations.
///
/// Three families, matching how the gateway reports them to clients:
/// validation (400), not-found (404), and precondition failures (409).
/// Every variant is a sender-only notice; no error ever broadcasts to
/// the rest of the room.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A required field was missing or blank.
    #[error("{0}")]
    Validation(String),

    /// No live room exists under this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The room already holds the maximum number of players.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// A new player tried to join a room whose round already started.
    #[error("the game in room {0} has already started")]
    GameInProgress(RoomCode),

    /// Not enough members to start a round.
    #[error("need at least {required} players, have {have}")]
    NotEnoughPlayers { required: usize, have: usize },

    /// The operation is reserved for the room creator.
    #[error("only the room creator can do that")]
    NotCreator,

    /// The operation is reserved for the current turn owner.
    #[error("it is not your turn")]
    NotTurnOwner,

    /// The sender is not a member of the addressed room.
    #[error("{0} is not a member of this room")]
    NotAMember(ConnectionId),

    /// The named target is not a usable member (unknown, or the sender
    /// themselves where self-selection is disallowed).
    #[error("invalid target {0}")]
    InvalidTarget(ConnectionId),

    /// The spy side channel is reserved for players holding Spy.
    #[error("only spies can use the spy channel")]
    NotASpy,

    /// The sender already cast a vote this round.
    #[error("{0} has already voted this round")]
    AlreadyVoted(ConnectionId),

    /// The requested operation is illegal in the room's current state.
    #[error("cannot {action} while the room is in {status}")]
    InvalidTransition {
        action: &'static str,
        status: RoomStatus,
    },

    /// Code generation kept colliding with live rooms.
    #[error("could not allocate a fresh room code")]
    CodeSpaceExhausted,
}

impl GameError {
    /// The HTTP-style wire code used in `ServerEvent::Error`.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RoomNotFound(_) => 404,
            _ => 409,
        }
    }
}
