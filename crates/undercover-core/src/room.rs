//! One room's state machine.
//!
//! A room owns its member list, round state, and vote tally, and is
//! mutated exclusively through the operations below. Every operation is
//! synchronous and non-suspending: it validates, mutates, and returns
//! the events to fan out, in that order. Interleaving is impossible
//! because the gateway serializes all dispatch.
//!
//! Reconnection model: the durable identity of a member is their
//! username. [`Room::admit`] with a username that is already present
//! swaps the stored connection id and re-points the creator and turn
//! owner if they referenced the old id. A stale disconnect for the old
//! id then finds no member and becomes a no-op.

use rand::Rng;
use undercover_protocol::{
    ConnectionId, Description, GameSettings, Recipient, Role, RoomCode,
    RoomSnapshot, RoomStatus, ServerEvent, Winners,
};

use crate::{GameError, VoteTally, roles};

/// Hard cap on room membership.
pub const MAX_PLAYERS: usize = 15;

/// Minimum members before a round can start. Three is the smallest
/// count where one spy, one Mr. White, and one civilian all fit.
pub const MIN_PLAYERS_TO_START: usize = 3;

/// An event paired with its audience.
pub type Outbound = (Recipient, ServerEvent);

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One member of a room.
///
/// Role fields are `None` exactly while the room is in the lobby or
/// freshly reset; they are populated together by the deal.
#[derive(Debug, Clone)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub username: String,
    pub role: Option<Role>,
    pub word: Option<String>,
    pub category: Option<String>,
    pub vote_count: u32,
    pub ready: bool,
}

impl Player {
    fn new(connection_id: ConnectionId, username: String) -> Self {
        Self {
            connection_id,
            username,
            role: None,
            word: None,
            category: None,
            vote_count: 0,
            ready: false,
        }
    }

    fn clear_round_fields(&mut self) {
        self.role = None;
        self.word = None;
        self.category = None;
        self.vote_count = 0;
        self.ready = false;
    }

    fn view(&self, reveal: bool) -> undercover_protocol::PlayerView {
        undercover_protocol::PlayerView {
            id: self.connection_id,
            username: self.username.clone(),
            ready: self.ready,
            vote_count: self.vote_count,
            role: if reveal { self.role } else { None },
            word: if reveal { self.word.clone() } else { None },
            category: if reveal { self.category.clone() } else { None },
        }
    }
}

/// Result of [`Room::admit`].
#[derive(Debug)]
pub struct Admitted {
    /// The connection id this username previously held, if the admit
    /// was a rejoin. The registry uses it to fix its membership index.
    pub replaced: Option<ConnectionId>,
    pub events: Vec<Outbound>,
}

/// Result of removing a member (kick or disconnect).
#[derive(Debug)]
pub struct Removal {
    pub removed: ConnectionId,
    /// `true` when the last member just left; the registry deletes the
    /// room in response.
    pub now_empty: bool,
    pub events: Vec<Outbound>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A session keyed by a short code, holding players and round state.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    /// Join order; position matters for display and for the fallback
    /// creator/turn-owner reassignment.
    players: Vec<Player>,
    status: RoomStatus,
    creator: ConnectionId,
    turn_owner: Option<ConnectionId>,
    descriptions: Vec<Description>,
    tally: VoteTally,
    winners: Option<Winners>,
    eliminated: Vec<ConnectionId>,
    settings: GameSettings,
}

impl Room {
    /// Creates a room in the lobby with its creator as sole member.
    pub fn new(code: RoomCode, creator: ConnectionId, username: String) -> Self {
        Self {
            code,
            players: vec![Player::new(creator, username)],
            status: RoomStatus::Lobby,
            creator,
            turn_owner: None,
            descriptions: Vec::new(),
            tally: VoteTally::new(),
            winners: None,
            eliminated: Vec::new(),
            settings: GameSettings::default(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn creator(&self) -> ConnectionId {
        self.creator
    }

    pub fn turn_owner(&self) -> Option<ConnectionId> {
        self.turn_owner
    }

    pub fn settings(&self) -> GameSettings {
        self.settings
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.players.len()
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection_id).collect()
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == conn)
    }

    fn member(&self, conn: ConnectionId) -> Result<&Player, GameError> {
        self.player(conn).ok_or(GameError::NotAMember(conn))
    }

    fn require_creator(&self, sender: ConnectionId) -> Result<(), GameError> {
        self.member(sender)?;
        if sender != self.creator {
            return Err(GameError::NotCreator);
        }
        Ok(())
    }

    fn require_turn_owner(&self, sender: ConnectionId) -> Result<(), GameError> {
        self.member(sender)?;
        if self.turn_owner != Some(sender) {
            return Err(GameError::NotTurnOwner);
        }
        Ok(())
    }

    /// Moves to `target`, or fails with a typed error naming the
    /// rejected action. Every status change funnels through here.
    fn transition(
        &mut self,
        target: RoomStatus,
        action: &'static str,
    ) -> Result<(), GameError> {
        if !self.status.can_transition_to(target) {
            return Err(GameError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        self.status = target;
        Ok(())
    }

    // -- snapshots ----------------------------------------------------------

    /// Builds the room as seen by `viewer`: other players' role, word
    /// and category stay hidden until the results phase.
    pub fn snapshot_for(&self, viewer: ConnectionId) -> RoomSnapshot {
        let reveal_all = self.status == RoomStatus::Results;
        RoomSnapshot {
            code: self.code.clone(),
            status: self.status,
            creator: self.creator,
            turn_owner: self.turn_owner,
            players: self
                .players
                .iter()
                .map(|p| p.view(reveal_all || p.connection_id == viewer))
                .collect(),
            descriptions: self.descriptions.clone(),
            tally: self.tally.entries().to_vec(),
            winners: self.winners,
            eliminated: self.eliminated.clone(),
            settings: self.settings,
        }
    }

    /// One personalized snapshot event per member.
    fn broadcast_snapshots<F>(&self, make: F) -> Vec<Outbound>
    where
        F: Fn(RoomSnapshot) -> ServerEvent,
    {
        self.players
            .iter()
            .map(|p| {
                (
                    Recipient::Player(p.connection_id),
                    make(self.snapshot_for(p.connection_id)),
                )
            })
            .collect()
    }

    // -- membership ---------------------------------------------------------

    /// Admits a connection under `username`: a rejoin when the name is
    /// already present (connection id swap, pointer reconciliation), a
    /// fresh join otherwise.
    ///
    /// # Errors
    /// New joins fail when the room is full or a round has started;
    /// rejoins are always accepted.
    pub fn admit(
        &mut self,
        conn: ConnectionId,
        username: &str,
    ) -> Result<Admitted, GameError> {
        if let Some(pos) = self.players.iter().position(|p| p.username == username) {
            let old = self.players[pos].connection_id;
            self.players[pos].connection_id = conn;
            if self.turn_owner == Some(old) {
                self.turn_owner = Some(conn);
            }
            if self.creator == old {
                self.creator = conn;
            }
            // Round state keyed by connection id must follow the swap,
            // or a rejoined member could vote twice and votes against
            // them would point at a dead id.
            self.tally.reassign(old, conn);
            for id in &mut self.eliminated {
                if *id == old {
                    *id = conn;
                }
            }
            tracing::info!(
                room = %self.code, %username, %old, new = %conn,
                "member rejoined"
            );
            let mut events = vec![(
                Recipient::Player(conn),
                ServerEvent::JoinSuccess {
                    room: self.snapshot_for(conn),
                },
            )];
            events.extend(self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }));
            return Ok(Admitted {
                replaced: Some(old),
                events,
            });
        }

        if self.status != RoomStatus::Lobby {
            return Err(GameError::GameInProgress(self.code.clone()));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::RoomFull(self.code.clone()));
        }

        self.players.push(Player::new(conn, username.to_string()));
        tracing::info!(
            room = %self.code, %username, %conn,
            members = self.players.len(),
            "member joined"
        );
        let mut events = vec![(
            Recipient::Player(conn),
            ServerEvent::JoinSuccess {
                room: self.snapshot_for(conn),
            },
        )];
        events.extend(self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }));
        Ok(Admitted {
            replaced: None,
            events,
        })
    }

    /// Removes `conn` from the room. Returns `None` when the id is not
    /// a member (e.g. a stale disconnect after a rejoin already swapped
    /// the id).
    ///
    /// Pointer policy: if the leaver was creator or turn owner, both
    /// fall to the first remaining member in join order.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> Option<Removal> {
        let pos = self
            .players
            .iter()
            .position(|p| p.connection_id == conn)?;
        let player = self.players.remove(pos);
        tracing::info!(
            room = %self.code, username = %player.username, %conn,
            remaining = self.players.len(),
            "member removed"
        );

        if self.players.is_empty() {
            return Some(Removal {
                removed: conn,
                now_empty: true,
                events: Vec::new(),
            });
        }

        let fallback = self.players[0].connection_id;
        if self.creator == conn {
            self.creator = fallback;
        }
        if self.turn_owner == Some(conn) {
            self.turn_owner = Some(fallback);
        }

        Some(Removal {
            removed: conn,
            now_empty: false,
            events: self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }),
        })
    }

    // -- round lifecycle ----------------------------------------------------

    /// Starts a round: deals roles, picks a random first speaker,
    /// clears the description log. Creator-only, lobby-only, and the
    /// room must hold at least [`MIN_PLAYERS_TO_START`] members.
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        sender: ConnectionId,
        rng: &mut R,
    ) -> Result<Vec<Outbound>, GameError> {
        self.require_creator(sender)?;
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(GameError::NotEnoughPlayers {
                required: MIN_PLAYERS_TO_START,
                have: self.players.len(),
            });
        }
        self.transition(RoomStatus::Assigning, "start the game")?;

        let assignments = roles::deal(self.players.len(), self.settings, rng);
        for (player, assignment) in self.players.iter_mut().zip(assignments) {
            player.clear_round_fields();
            player.role = Some(assignment.role);
            player.word = assignment.word;
            player.category = Some(assignment.category);
        }

        self.descriptions.clear();
        self.tally.reset();
        self.winners = None;
        self.eliminated.clear();

        let first = rng.random_range(0..self.players.len());
        self.turn_owner = Some(self.players[first].connection_id);
        self.transition(RoomStatus::Playing, "start the game")?;

        tracing::info!(
            room = %self.code,
            members = self.players.len(),
            first_speaker = %self.players[first].username,
            "game started"
        );
        Ok(self.broadcast_snapshots(|room| ServerEvent::GameStarted { room }))
    }

    /// Appends the current speaker's description and signals that the
    /// room now waits for them to pick the next speaker.
    pub fn submit_description(
        &mut self,
        sender: ConnectionId,
        text: String,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.status != RoomStatus::Playing {
            return Err(GameError::InvalidTransition {
                action: "describe",
                status: self.status,
            });
        }
        self.require_turn_owner(sender)?;

        let username = self
            .member(sender)?
            .username
            .clone();
        self.descriptions.push(Description { username, text });

        Ok(vec![
            (
                Recipient::All,
                ServerEvent::DescriptionUpdate {
                    descriptions: self.descriptions.clone(),
                    last_speaker: sender,
                },
            ),
            (
                Recipient::All,
                ServerEvent::AwaitingNextPlayer { speaker: sender },
            ),
        ])
    }

    /// Hands the turn to `target`, which must be a current member
    /// other than the sender.
    pub fn choose_next(
        &mut self,
        sender: ConnectionId,
        target: ConnectionId,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.status != RoomStatus::Playing {
            return Err(GameError::InvalidTransition {
                action: "pass the turn",
                status: self.status,
            });
        }
        self.require_turn_owner(sender)?;
        if target == sender || self.player(target).is_none() {
            return Err(GameError::InvalidTarget(target));
        }

        self.turn_owner = Some(target);
        Ok(vec![(
            Recipient::All,
            ServerEvent::TurnUpdated { turn_owner: target },
        )])
    }

    /// Opens (or re-opens) the voting phase. The tally clears on every
    /// (re)start.
    pub fn start_voting(
        &mut self,
        sender: ConnectionId,
    ) -> Result<Vec<Outbound>, GameError> {
        self.member(sender)?;
        self.transition(RoomStatus::Voting, "start voting")?;
        self.tally.reset();
        for p in &mut self.players {
            p.vote_count = 0;
        }
        Ok(self.broadcast_snapshots(|room| ServerEvent::VotingStarted { room }))
    }

    /// Records one vote. Outside the voting phase this is a silent
    /// no-op with no broadcast.
    ///
    /// The round resolves once every current member has voted: the top
    /// `spy_count` targets are eliminated (ties break by the tally's
    /// first-appearance order) and civilians win iff no spy survives.
    pub fn cast_vote(
        &mut self,
        sender: ConnectionId,
        target: ConnectionId,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.status != RoomStatus::Voting {
            tracing::debug!(
                room = %self.code, %sender, status = %self.status,
                "vote outside voting phase ignored"
            );
            return Ok(Vec::new());
        }
        self.member(sender)?;
        if self.player(target).is_none() {
            return Err(GameError::InvalidTarget(target));
        }

        self.tally.record(sender, target)?;
        if let Some(p) = self
            .players
            .iter_mut()
            .find(|p| p.connection_id == target)
        {
            p.vote_count += 1;
        }

        if self.tally.voters() < self.players.len() {
            return Ok(vec![(
                Recipient::All,
                ServerEvent::VoteUpdate {
                    tally: self.tally.entries().to_vec(),
                },
            )]);
        }

        // Everyone voted: resolve the round.
        let spy_count = self
            .players
            .iter()
            .filter(|p| p.role == Some(Role::Spy))
            .count();
        self.eliminated = self.tally.leaders(spy_count);
        let spies_remaining = self
            .players
            .iter()
            .filter(|p| {
                p.role == Some(Role::Spy)
                    && !self.eliminated.contains(&p.connection_id)
            })
            .count();
        self.winners = Some(if spies_remaining == 0 {
            Winners::Civilians
        } else {
            Winners::Spies
        });
        self.transition(RoomStatus::Results, "finish voting")?;

        tracing::info!(
            room = %self.code,
            winners = ?self.winners,
            eliminated = self.eliminated.len(),
            "round resolved"
        );
        Ok(self.broadcast_snapshots(|room| ServerEvent::GameEnded { room }))
    }

    // -- lobby administration -----------------------------------------------

    /// Replaces the room settings. Creator-only; takes effect at the
    /// next deal.
    pub fn update_settings(
        &mut self,
        sender: ConnectionId,
        settings: GameSettings,
    ) -> Result<Vec<Outbound>, GameError> {
        self.require_creator(sender)?;
        self.settings = settings;
        Ok(self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }))
    }

    /// Removes `target` from the room. Creator-only; follows the same
    /// pointer policy as a disconnect.
    pub fn kick(
        &mut self,
        sender: ConnectionId,
        target: ConnectionId,
    ) -> Result<Removal, GameError> {
        self.require_creator(sender)?;
        self.member(target)?;
        self.remove_connection(target)
            .ok_or(GameError::InvalidTarget(target))
    }

    /// Clears round data and returns to the lobby, keeping membership
    /// and settings. Creator-only, legal from any status.
    pub fn reset(
        &mut self,
        sender: ConnectionId,
    ) -> Result<Vec<Outbound>, GameError> {
        self.require_creator(sender)?;
        self.clear_round();
        tracing::info!(room = %self.code, "room reset");
        Ok(self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }))
    }

    /// Returns the room to the lobby after a finished round.
    pub fn play_again(
        &mut self,
        sender: ConnectionId,
    ) -> Result<Vec<Outbound>, GameError> {
        self.member(sender)?;
        if self.status != RoomStatus::Results {
            return Err(GameError::InvalidTransition {
                action: "play again",
                status: self.status,
            });
        }
        self.clear_round();
        Ok(self.broadcast_snapshots(|room| ServerEvent::RoomUpdated { room }))
    }

    fn clear_round(&mut self) {
        self.status = RoomStatus::Lobby;
        self.descriptions.clear();
        self.tally.reset();
        self.winners = None;
        self.eliminated.clear();
        self.turn_owner = None;
        for p in &mut self.players {
            p.clear_round_fields();
        }
    }

    // -- side channel -------------------------------------------------------

    /// Relays a spy-channel message. The sender must currently hold
    /// Spy, and the relay goes only to connections whose player holds
    /// Spy — recipients are filtered server-side.
    pub fn spy_chat(
        &self,
        sender: ConnectionId,
        message: String,
    ) -> Result<Vec<Outbound>, GameError> {
        let player = self.member(sender)?;
        if player.role != Some(Role::Spy) {
            return Err(GameError::NotASpy);
        }
        let username = player.username.clone();
        let spies: Vec<ConnectionId> = self
            .players
            .iter()
            .filter(|p| p.role == Some(Role::Spy))
            .map(|p| p.connection_id)
            .collect();
        Ok(vec![(
            Recipient::Players(spies),
            ServerEvent::SpyChatMessage { username, message },
        )])
    }
}

// =========================================================================
// Tests
// =========================================================================
