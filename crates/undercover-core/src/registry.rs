//! Room registry: the process-wide store of live rooms.
//!
//! Constructed once and owned by the gateway — no globals. Rooms are
//! owned exclusively by the registry; operations borrow them for the
//! duration of one dispatch and never retain references. Alongside the
//! room map the registry keeps a connection → room code index so
//! disconnects resolve without scanning every room.

use std::collections::HashMap;

use rand::Rng;
use undercover_protocol::{ConnectionId, RoomCode};

use crate::room::{Admitted, Removal, Room};
use crate::GameError;

/// Alphabet for generated codes: base-36, uppercase.
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// How many collisions we tolerate before giving up. The code space
/// holds ~1.6M entries, so 32 straight collisions means something is
/// deeply wrong (or the server is absurdly full).
const MAX_CODE_ATTEMPTS: usize = 32;

/// All live rooms, keyed by code.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomCode, Room>,
    /// Which room each connection currently sits in. The gateway keeps
    /// this at one room per connection by removing a connection from
    /// its previous room (see [`Registry::remove_from`]) whenever it
    /// creates or joins another.
    memberships: HashMap<ConnectionId, RoomCode>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Looks up a live room.
    ///
    /// # Errors
    /// [`GameError::RoomNotFound`] if no room exists under this code.
    pub fn room(&self, code: &RoomCode) -> Result<&Room, GameError> {
        self.rooms
            .get(code)
            .ok_or_else(|| GameError::RoomNotFound(code.clone()))
    }

    pub fn room_mut(&mut self, code: &RoomCode) -> Result<&mut Room, GameError> {
        self.rooms
            .get_mut(code)
            .ok_or_else(|| GameError::RoomNotFound(code.clone()))
    }

    /// The room a connection currently belongs to, if any.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomCode> {
        self.memberships.get(&conn)
    }

    /// Creates a room with a freshly generated unique code and the
    /// sender as creator and sole member.
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        conn: ConnectionId,
        username: String,
        rng: &mut R,
    ) -> Result<&Room, GameError> {
        let code = self.generate_code(rng)?;
        let room = Room::new(code.clone(), conn, username);
        self.rooms.insert(code.clone(), room);
        self.memberships.insert(conn, code.clone());
        tracing::info!(room = %code, creator = %conn, "room created");
        // Just inserted under this code.
        self.room(&code)
    }

    /// Admits a connection into the room under `code` (join or rejoin)
    /// and keeps the membership index in sync.
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        conn: ConnectionId,
        username: &str,
    ) -> Result<Admitted, GameError> {
        let room = self.room_mut(code)?;
        let admitted = room.admit(conn, username)?;
        if let Some(old) = admitted.replaced {
            self.memberships.remove(&old);
        }
        self.memberships.insert(conn, code.clone());
        Ok(admitted)
    }

    /// Kicks `target` out of the room under `code` on behalf of
    /// `sender`, deleting the room if it empties.
    pub fn kick(
        &mut self,
        code: &RoomCode,
        sender: ConnectionId,
        target: ConnectionId,
    ) -> Result<Removal, GameError> {
        let room = self.room_mut(code)?;
        let removal = room.kick(sender, target)?;
        self.memberships.remove(&removal.removed);
        if removal.now_empty {
            self.delete(code);
        }
        Ok(removal)
    }

    /// Handles a transport-level disconnect: removes the connection
    /// from its room (if it is still a member under this id) and
    /// deletes the room when it empties. Returns `None` when the
    /// connection was in no room, or its id was already superseded by
    /// a rejoin.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> Option<Removal> {
        let code = self.memberships.remove(&conn)?;
        self.remove_from(&code, conn)
    }

    /// Removes `conn` from the room under `code`, bypassing the
    /// membership index. Used when the index already points at the
    /// connection's *new* room and the old room still lists it.
    pub fn remove_from(
        &mut self,
        code: &RoomCode,
        conn: ConnectionId,
    ) -> Option<Removal> {
        let room = self.rooms.get_mut(code)?;
        let removal = room.remove_connection(conn)?;
        if removal.now_empty {
            self.delete(code);
        }
        Some(removal)
    }

    fn delete(&mut self, code: &RoomCode) {
        self.rooms.remove(code);
        tracing::info!(room = %code, "empty room deleted");
    }

    /// Generates a code that no live room holds, retrying on
    /// collision. The space is small enough (36^4) that collisions are
    /// expected at scale and must be handled, not assumed away.
    fn generate_code<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<RoomCode, GameError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code: String = (0..RoomCode::LEN)
                .map(|_| {
                    let i = rng.random_range(0..CODE_ALPHABET.len());
                    CODE_ALPHABET[i] as char
                })
                .collect();
            let code = RoomCode::from_canonical(code);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(room = %code, "room code collision, retrying");
        }
        Err(GameError::CodeSpaceExhausted)
    }
}

// =========================================================================
// Tests
// =========================================================================
