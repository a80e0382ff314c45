//! Wire types for the undercover game protocol.
//!
//! Everything in this module travels between client and server as JSON.
//! The server is authoritative: clients send [`ClientMessage`] requests,
//! the server answers with [`ServerEvent`] notifications. Snapshots are
//! built *per recipient* so a player never sees another player's secret
//! role or word before the results phase.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A transient handle for one live connection.
///
/// Connection ids are reassigned on every reconnect — the durable
/// identity of a player inside a room is their username, not this id.
/// Newtype over `u64`, serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A short room code: 4 uppercase base-36 characters when generated by
/// the server. Codes arriving from clients are normalized (trimmed and
/// uppercased) so `" ab3x "` and `"AB3X"` address the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in a generated code.
    pub const LEN: usize = 4;

    /// Wraps an already-canonical code (used by the generator).
    pub fn from_canonical(code: String) -> Self {
        Self(code)
    }

    /// Normalizes raw client input into a canonical code.
    pub fn normalized(input: &str) -> Self {
        Self(input.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// A player's secret role for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Knows word A.
    Civilian,
    /// Knows only the category.
    Spy,
    /// Knows word B, the decoy.
    MrWhite,
}

/// Which faction won the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winners {
    Civilians,
    Spies,
}

/// Round settings, adjustable by the room creator while in the lobby.
///
/// Requested counts are advisory: the role assignment engine clamps
/// them so that each special role appears at least once and at least
/// one civilian always remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub num_spies: usize,
    pub num_mr_white: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            num_spies: 1,
            num_mr_white: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Lobby → Assigning → Playing → Voting → Results
///   ↑        (transient)          ↻ (re-vote)  │
///   └────────────(play again / admin reset)────┘
/// ```
///
/// `Assigning` only exists while roles are being dealt; clients never
/// observe it in a snapshot because the deal is synchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Lobby,
    Assigning,
    Playing,
    Voting,
    Results,
}

impl RoomStatus {
    /// Returns `true` if moving to `target` is a legal edge of the
    /// state machine. Any state may fall back to `Lobby` (admin reset
    /// and play-again both land there); everything else follows the
    /// forward path, with `Voting → Voting` allowed for a re-vote.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::Assigning)
                | (Self::Assigning, Self::Playing)
                | (Self::Playing, Self::Voting)
                | (Self::Voting, Self::Voting)
                | (Self::Voting, Self::Results)
                | (_, Self::Lobby)
        )
    }

    /// Returns `true` if a round is currently underway.
    pub fn in_round(self) -> bool {
        matches!(self, Self::Playing | Self::Voting)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lobby => "Lobby",
            Self::Assigning => "Assigning",
            Self::Playing => "Playing",
            Self::Voting => "Voting",
            Self::Results => "Results",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One entry in the description log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub username: String,
    pub text: String,
}

/// One entry of the public vote tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub target: ConnectionId,
    pub count: u32,
}

/// A player as seen by one particular recipient.
///
/// `role`, `word` and `category` are populated only for the viewer's
/// own entry, or for everyone once the room reaches `Results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: ConnectionId,
    pub username: String,
    pub ready: bool,
    pub vote_count: u32,
    pub role: Option<Role>,
    pub word: Option<String>,
    pub category: Option<String>,
}

/// A full-room snapshot, built per viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub creator: ConnectionId,
    pub turn_owner: Option<ConnectionId>,
    pub players: Vec<PlayerView>,
    pub descriptions: Vec<Description>,
    pub tally: Vec<VoteCount>,
    pub winners: Option<Winners>,
    pub eliminated: Vec<ConnectionId>,
    pub settings: GameSettings,
}

// ---------------------------------------------------------------------------
// Client → server messages
// ---------------------------------------------------------------------------

/// Moderation commands available to the room creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminCommand {
    Kick,
    Reset,
}

/// Everything a client can ask the server to do.
///
/// Internally tagged (`{"type": "CreateRoom", "username": "ana"}`) so
/// browser clients can switch on a single `type` field. Room codes are
/// raw strings here; the server normalizes them before lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    CreateRoom {
        username: String,
    },
    JoinRoom {
        room_code: String,
        username: String,
    },
    StartGame {
        room_code: String,
    },
    SubmitDescription {
        room_code: String,
        text: String,
    },
    ChooseNextPlayer {
        room_code: String,
        target: ConnectionId,
    },
    StartVoting {
        room_code: String,
    },
    CastVote {
        room_code: String,
        target: ConnectionId,
    },
    UpdateSettings {
        room_code: String,
        settings: GameSettings,
    },
    AdminAction {
        room_code: String,
        command: AdminCommand,
        target: Option<ConnectionId>,
    },
    PlayAgain {
        room_code: String,
    },
    SpyChat {
        room_code: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Server → client events
// ---------------------------------------------------------------------------

/// Everything the server can tell a client.
///
/// Snapshot-carrying variants are personalized per recipient (see
/// [`PlayerView`]); incremental notices carry identical content for
/// every recipient. `Error` is always point-to-point: it goes to the
/// connection whose request failed, never to the rest of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    RoomCreated {
        room: RoomSnapshot,
    },
    JoinSuccess {
        room: RoomSnapshot,
    },
    RoomUpdated {
        room: RoomSnapshot,
    },
    GameStarted {
        room: RoomSnapshot,
    },
    VotingStarted {
        room: RoomSnapshot,
    },
    GameEnded {
        room: RoomSnapshot,
    },
    DescriptionUpdate {
        descriptions: Vec<Description>,
        last_speaker: ConnectionId,
    },
    /// The current speaker finished describing and must now pick who
    /// speaks next.
    AwaitingNextPlayer {
        speaker: ConnectionId,
    },
    TurnUpdated {
        turn_owner: ConnectionId,
    },
    VoteUpdate {
        tally: Vec<VoteCount>,
    },
    SpyChatMessage {
        username: String,
        message: String,
    },
    /// HTTP-style codes: 400 validation, 404 unknown room,
    /// 409 precondition failed.
    Error {
        code: u16,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Recipient — who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a produced [`ServerEvent`].
///
/// Room operations return `(Recipient, ServerEvent)` pairs; the gateway
/// resolves `All` against the room's membership at fanout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every current member of the room.
    All,
    /// One specific connection.
    Player(ConnectionId),
    /// An explicit set of connections (e.g. only the spies).
    Players(Vec<ConnectionId>),
}

// =========================================================================
// Tests
// =========================================================================
