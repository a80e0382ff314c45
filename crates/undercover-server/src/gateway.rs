//! Session gateway: resolves inbound messages to room operations and
//! fans the resulting events out to subscribers.
//!
//! The gateway owns the [`Registry`] and the outbound channel of every
//! live connection. [`Gateway::dispatch`] is fully synchronous — it
//! never awaits between reading and writing room state, so operations
//! can never observe a half-applied transition. The server serializes
//! calls through one `tokio::sync::Mutex`, which gives each connection
//! send-order processing and a single global arrival order overall.
//!
//! Error policy: any [`GameError`] becomes a single `Error` event to
//! the originating connection. Errors never broadcast; an unknown room
//! code in particular is reported to the requester only.

use std::collections::HashMap;

use tokio::sync::mpsc;
use undercover_core::{GameError, Outbound, Registry};
use undercover_protocol::{
    AdminCommand, ClientMessage, ConnectionId, Recipient, RoomCode,
    ServerEvent,
};

/// Outbound channel for one connection's events.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// The dispatch core: registry plus connection fanout table.
#[derive(Default)]
pub struct Gateway {
    registry: Registry,
    connections: HashMap<ConnectionId, EventSender>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the registry, mainly for tests and diagnostics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a freshly accepted connection's outbound channel.
    pub fn register(&mut self, conn: ConnectionId, sender: EventSender) {
        self.connections.insert(conn, sender);
    }

    /// Handles a transport-level disconnect: drops the outbound
    /// channel and removes the connection from its room, deleting the
    /// room if it empties.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        if let Some(removal) = self.registry.remove_connection(conn) {
            self.fanout(None, removal.events);
        }
    }

    /// Maps one inbound message to exactly one state-machine operation
    /// and delivers the produced events.
    pub fn dispatch(&mut self, sender: ConnectionId, msg: ClientMessage) {
        match self.handle(sender, msg) {
            Ok((room, events)) => self.fanout(room.as_ref(), events),
            Err(err) => {
                tracing::debug!(%sender, error = %err, "request rejected");
                self.send_to(
                    sender,
                    ServerEvent::Error {
                        code: err.code(),
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    fn handle(
        &mut self,
        sender: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(Option<RoomCode>, Vec<Outbound>), GameError> {
        match msg {
            ClientMessage::CreateRoom { username } => {
                let username = require_username(&username)?;
                let prior = self.registry.room_of(sender).cloned();
                let mut rng = rand::rng();
                let room =
                    self.registry.create_room(sender, username, &mut rng)?;
                let snapshot = room.snapshot_for(sender);
                let mut events = self.evict(sender, prior.as_ref(), None);
                events.push((
                    Recipient::Player(sender),
                    ServerEvent::RoomCreated { room: snapshot },
                ));
                Ok((None, events))
            }

            ClientMessage::JoinRoom {
                room_code,
                username,
            } => {
                let code = require_code(&room_code)?;
                let username = require_username(&username)?;
                let prior = self.registry.room_of(sender).cloned();
                let admitted =
                    self.registry.join_room(&code, sender, &username)?;
                let mut events =
                    self.evict(sender, prior.as_ref(), Some(&code));
                events.extend(admitted.events);
                Ok((Some(code), events))
            }

            ClientMessage::StartGame { room_code } => {
                let code = require_code(&room_code)?;
                let mut rng = rand::rng();
                let events = self
                    .registry
                    .room_mut(&code)?
                    .start_game(sender, &mut rng)?;
                Ok((Some(code), events))
            }

            ClientMessage::SubmitDescription { room_code, text } => {
                let code = require_code(&room_code)?;
                let events = self
                    .registry
                    .room_mut(&code)?
                    .submit_description(sender, text)?;
                Ok((Some(code), events))
            }

            ClientMessage::ChooseNextPlayer { room_code, target } => {
                let code = require_code(&room_code)?;
                let events = self
                    .registry
                    .room_mut(&code)?
                    .choose_next(sender, target)?;
                Ok((Some(code), events))
            }

            ClientMessage::StartVoting { room_code } => {
                let code = require_code(&room_code)?;
                let events =
                    self.registry.room_mut(&code)?.start_voting(sender)?;
                Ok((Some(code), events))
            }

            ClientMessage::CastVote { room_code, target } => {
                let code = require_code(&room_code)?;
                let events = self
                    .registry
                    .room_mut(&code)?
                    .cast_vote(sender, target)?;
                Ok((Some(code), events))
            }

            ClientMessage::UpdateSettings {
                room_code,
                settings,
            } => {
                let code = require_code(&room_code)?;
                let events = self
                    .registry
                    .room_mut(&code)?
                    .update_settings(sender, settings)?;
                Ok((Some(code), events))
            }

            ClientMessage::AdminAction {
                room_code,
                command,
                target,
            } => {
                let code = require_code(&room_code)?;
                match command {
                    AdminCommand::Kick => {
                        let target = target.ok_or_else(|| {
                            GameError::Validation(
                                "kick requires a target".into(),
                            )
                        })?;
                        let removal =
                            self.registry.kick(&code, sender, target)?;
                        Ok((Some(code), removal.events))
                    }
                    AdminCommand::Reset => {
                        let events =
                            self.registry.room_mut(&code)?.reset(sender)?;
                        Ok((Some(code), events))
                    }
                }
            }

            ClientMessage::PlayAgain { room_code } => {
                let code = require_code(&room_code)?;
                let events =
                    self.registry.room_mut(&code)?.play_again(sender)?;
                Ok((Some(code), events))
            }

            ClientMessage::SpyChat { room_code, message } => {
                let code = require_code(&room_code)?;
                let events =
                    self.registry.room(&code)?.spy_chat(sender, message)?;
                Ok((Some(code), events))
            }
        }
    }

    /// Removes `sender` from the room it sat in before a successful
    /// create/join, so a connection is never a member of two rooms at
    /// once. Runs after the new room accepted the sender; the returned
    /// events notify the old room's remaining members.
    fn evict(
        &mut self,
        sender: ConnectionId,
        prior: Option<&RoomCode>,
        joined: Option<&RoomCode>,
    ) -> Vec<Outbound> {
        let Some(prior) = prior.filter(|p| Some(*p) != joined) else {
            return Vec::new();
        };
        match self.registry.remove_from(prior, sender) {
            Some(removal) => removal.events,
            None => Vec::new(),
        }
    }

    /// Delivers produced events. `Recipient::All` resolves against the
    /// room's membership *after* the operation, so departed members
    /// are excluded and fresh joiners included.
    fn fanout(&self, room: Option<&RoomCode>, events: Vec<Outbound>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::Player(id) => self.send_to(id, event),
                Recipient::Players(ids) => {
                    for id in ids {
                        self.send_to(id, event.clone());
                    }
                }
                Recipient::All => {
                    let Some(code) = room else { continue };
                    let Ok(room) = self.registry.room(code) else {
                        continue;
                    };
                    for id in room.member_ids() {
                        self.send_to(id, event.clone());
                    }
                }
            }
        }
    }

    /// Sends an event to a single connection. Silently drops if the
    /// receiver is gone (connection already closed).
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.connections.get(&conn) {
            let _ = sender.send(event);
        }
    }
}

fn require_username(raw: &str) -> Result<String, GameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::Validation("username required".into()));
    }
    Ok(trimmed.to_string())
}

fn require_code(raw: &str) -> Result<RoomCode, GameError> {
    let code = RoomCode::normalized(raw);
    if code.is_empty() {
        return Err(GameError::Validation("room code required".into()));
    }
    Ok(code)
}
