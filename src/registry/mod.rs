//! Room registry
//!
//! Owns every live room and knows which room each connection occupies.
//!
//! Locking:
//! - `rooms` maps codes to rooms and is only held long enough to look up,
//!   insert or remove an entry
//! - each room sits behind its own mutex, so actions on one room are
//!   serialized while different rooms never contend
//! - `connections` has its own lock, never held while a room is locked
//!
//! A room that empties is marked closed under its own lock before it is
//! removed from the map, so a join racing with the last departure sees
//! `NotFound` instead of reviving it.

use crate::game::room::{Removal, Resolution, RoundEffect, VoteOutcome};
use crate::game::tally::Tally;
use crate::game::view::{PlayerView, RoomView, Viewer};
use crate::game::{
    normalize_name, ConnectionId, GameError, GameResult, Phase, PlayerId, Room, RoomCode,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

/// How many codes to try before giving up on finding an unused one
const MAX_CODE_ATTEMPTS: usize = 64;

type SharedRoom = Arc<Mutex<Room>>;

/// A room's broadcast view and who should receive it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub view: RoomView,
    /// Connections of every member, in join order
    pub members: Vec<ConnectionId>,
}

impl Snapshot {
    fn of(room: &Room) -> Self {
        Self {
            view: RoomView::of(room, Viewer::Room),
            members: room.connections(),
        }
    }
}

/// A player entering a room (by creating or joining it)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entered {
    pub room_code: RoomCode,
    pub player: PlayerView,
    pub snapshot: Snapshot,
    /// The room this connection was in before, if any
    pub previous: Option<Departure>,
}

/// A word added to a room's pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAdded {
    pub word: String,
    pub words: Vec<String>,
    pub members: Vec<ConnectionId>,
}

/// One player's private start-of-round payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub connection_id: ConnectionId,
    pub is_chameleon: bool,
    pub view: RoomView,
}

/// A phase change request that was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseAdvanced {
    pub phase: Phase,
    /// False when the room was already in the requested phase
    pub changed: bool,
    pub snapshot: Snapshot,
}

/// A vote that was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecorded {
    pub tally: Tally,
    pub complete: bool,
    pub verdict: Option<Verdict>,
    pub snapshot: Snapshot,
}

/// A completed vote, with the chameleon unmasked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub suspect: PlayerId,
    pub chameleon: PlayerView,
}

/// The chameleon's guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessMade {
    pub guess: String,
    pub correct: bool,
    pub snapshot: Snapshot,
}

/// A player leaving a room, by request or by disconnecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_code: RoomCode,
    pub player: PlayerView,
    pub new_host: Option<PlayerId>,
    /// Set when the departure completed the round's voting
    pub verdict: Option<Verdict>,
    /// None when the room was destroyed
    pub remaining: Option<Snapshot>,
}

/// Thread-safe map of live rooms and connection memberships
#[derive(Default)]
pub struct Registry {
    rooms: RwLock<HashMap<RoomCode, SharedRoom>>,
    connections: Mutex<HashMap<ConnectionId, RoomCode>>,
}

/// Lock a mutex, carrying on if another thread panicked while holding it.
/// Room operations validate before mutating, so the data is still coherent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Draw codes from `next` until one is not in `taken`.
fn allocate_code<F>(taken: &HashMap<RoomCode, SharedRoom>, mut next: F) -> GameResult<RoomCode>
where
    F: FnMut() -> RoomCode,
{
    (0..MAX_CODE_ATTEMPTS)
        .map(|_| next())
        .find(|code| !taken.contains_key(code))
        .ok_or(GameError::ResourceExhausted)
}

fn verdict_view(room: &Room, resolution: &Resolution) -> Option<Verdict> {
    let chameleon = room.player(&resolution.chameleon)?;
    Some(Verdict {
        suspect: resolution.suspect.clone(),
        chameleon: PlayerView {
            is_chameleon: Some(true),
            ..PlayerView::of(chameleon, room.phase())
        },
    })
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The room `connection_id` currently occupies
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<RoomCode> {
        lock(&self.connections).get(&connection_id).cloned()
    }

    fn room_handle(&self, code: &RoomCode) -> Option<SharedRoom> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
    }

    /// Run `f` on the room with `code`, holding that room's lock.
    fn with_room<T>(
        &self,
        code: &RoomCode,
        f: impl FnOnce(&mut Room) -> GameResult<T>,
    ) -> GameResult<T> {
        let handle = self.room_handle(code).ok_or(GameError::NotFound)?;
        let mut room = lock(&handle);
        if room.is_closed() {
            return Err(GameError::NotFound);
        }
        f(&mut room)
    }

    /// Look up a room without changing anything.
    #[allow(dead_code)]
    pub fn resolve_room(&self, code: &RoomCode) -> Option<Snapshot> {
        self.with_room(code, |room| Ok(Snapshot::of(room))).ok()
    }

    /// Bind `connection_id` to `code`, removing it from any other room first.
    fn bind(&self, connection_id: ConnectionId, code: &RoomCode) -> Option<Departure> {
        let previous = lock(&self.connections).insert(connection_id, code.clone());
        match previous {
            Some(old) if &old != code => self.depart(connection_id, &old),
            _ => None,
        }
    }

    /// Create a room with the caller as its host.
    pub fn create_room(&self, connection_id: ConnectionId, name: &str) -> GameResult<Entered> {
        let name = normalize_name(name)?;
        let mut rng = rand::rng();

        let (room_code, player, snapshot) = {
            let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
            let code = allocate_code(&rooms, || RoomCode::generate_with_rng(&mut rng))?;
            let mut room = Room::new(code.clone());
            let player = room.add_player_with_rng(connection_id, &name, &mut rng)?;
            let snapshot = Snapshot::of(&room);
            rooms.insert(code.clone(), Arc::new(Mutex::new(room)));
            (code, PlayerView::of(&player, Phase::Lobby), snapshot)
        };

        info!(room = %room_code, player = %player.id, %connection_id, "room created");
        let previous = self.bind(connection_id, &room_code);
        Ok(Entered {
            room_code,
            player,
            snapshot,
            previous,
        })
    }

    /// Join an existing room in its lobby.
    pub fn join_room(
        &self,
        connection_id: ConnectionId,
        name: &str,
        code: &RoomCode,
    ) -> GameResult<Entered> {
        let (player, snapshot) = self.with_room(code, |room| {
            let player = room.add_player_with_rng(connection_id, name, &mut rand::rng())?;
            Ok((PlayerView::of(&player, room.phase()), Snapshot::of(room)))
        })?;

        info!(room = %code, player = %player.id, %connection_id, "player joined");
        let previous = self.bind(connection_id, code);
        Ok(Entered {
            room_code: code.clone(),
            player,
            snapshot,
            previous,
        })
    }

    /// Add a word to a room's pool.
    pub fn add_word(
        &self,
        connection_id: ConnectionId,
        code: &RoomCode,
        word: &str,
    ) -> GameResult<WordAdded> {
        self.with_room(code, |room| {
            let words = room.add_word(connection_id, word)?.to_vec();
            let word = words.last().cloned().unwrap_or_default();
            debug!(room = %code, count = words.len(), "word added");
            Ok(WordAdded {
                word,
                words,
                members: room.connections(),
            })
        })
    }

    /// Start a round. Returns one private reveal per player.
    pub fn start_game(&self, connection_id: ConnectionId, code: &RoomCode) -> GameResult<Vec<Reveal>> {
        self.with_room(code, |room| {
            room.start_game_with_rng(connection_id, &mut rand::rng())?;
            info!(room = %code, players = room.players().len(), "round started");
            Ok(room
                .players()
                .iter()
                .map(|p| Reveal {
                    connection_id: p.connection_id,
                    is_chameleon: p.is_chameleon,
                    view: RoomView::of(
                        room,
                        Viewer::RoundReveal {
                            is_chameleon: p.is_chameleon,
                        },
                    ),
                })
                .collect())
        })
    }

    /// Move a room to the next phase of its round.
    pub fn advance_phase(&self, code: &RoomCode, phase: Phase) -> GameResult<PhaseAdvanced> {
        self.with_room(code, |room| {
            let changed = room.advance_phase(phase)?;
            if changed {
                debug!(room = %code, %phase, "phase advanced");
            }
            Ok(PhaseAdvanced {
                phase: room.phase(),
                changed,
                snapshot: Snapshot::of(room),
            })
        })
    }

    /// Record a vote.
    pub fn cast_vote(
        &self,
        connection_id: ConnectionId,
        code: &RoomCode,
        target: &PlayerId,
    ) -> GameResult<VoteRecorded> {
        self.with_room(code, |room| {
            let VoteOutcome {
                tally,
                complete,
                resolution,
            } = room.cast_vote(connection_id, target)?;
            let verdict = resolution.as_ref().and_then(|r| verdict_view(room, r));
            if let Some(resolution) = &resolution {
                info!(room = %code, verdict = ?resolution.verdict, "voting complete");
            }
            Ok(VoteRecorded {
                tally,
                complete,
                verdict,
                snapshot: Snapshot::of(room),
            })
        })
    }

    /// The chameleon's guess at the secret word.
    pub fn chameleon_guess(
        &self,
        connection_id: ConnectionId,
        code: &RoomCode,
        guess: &str,
    ) -> GameResult<GuessMade> {
        self.with_room(code, |room| {
            let correct = room.chameleon_guess(connection_id, guess)?;
            info!(room = %code, correct, "chameleon guessed");
            Ok(GuessMade {
                guess: room.last_guess().to_string(),
                correct,
                snapshot: Snapshot::of(room),
            })
        })
    }

    /// Return a room to its lobby, keeping players and words.
    pub fn new_game(&self, code: &RoomCode) -> GameResult<Snapshot> {
        self.with_room(code, |room| {
            room.new_game();
            debug!(room = %code, "new game");
            Ok(Snapshot::of(room))
        })
    }

    /// Leave a room on request.
    pub fn leave_room(&self, connection_id: ConnectionId, code: &RoomCode) -> GameResult<Departure> {
        {
            let mut connections = lock(&self.connections);
            if connections.get(&connection_id) == Some(code) {
                connections.remove(&connection_id);
            }
        }
        self.depart(connection_id, code).ok_or(GameError::NotFound)
    }

    /// A connection went away. Idempotent: unknown connections are ignored.
    pub fn handle_disconnect(&self, connection_id: ConnectionId) -> Option<Departure> {
        self.remove_player(connection_id)
    }

    /// Remove `connection_id` from whatever room it occupies.
    pub fn remove_player(&self, connection_id: ConnectionId) -> Option<Departure> {
        let code = lock(&self.connections).remove(&connection_id)?;
        self.depart(connection_id, &code)
    }

    fn depart(&self, connection_id: ConnectionId, code: &RoomCode) -> Option<Departure> {
        let handle = self.room_handle(code)?;
        let departure = {
            let mut room = lock(&handle);
            if room.is_closed() {
                return None;
            }
            let Removal {
                player,
                new_host,
                round_effect,
            } = room.remove_player(connection_id)?;

            let verdict = match &round_effect {
                RoundEffect::Resolved(resolution) => verdict_view(&room, resolution),
                _ => None,
            };
            match &round_effect {
                RoundEffect::None => {}
                RoundEffect::VotesDropped { dropped } => {
                    debug!(room = %code, dropped, "votes dropped with departing player");
                }
                effect => info!(room = %code, ?effect, "round affected by departure"),
            }
            let remaining = if room.is_empty() {
                room.close();
                None
            } else {
                Some(Snapshot::of(&room))
            };
            Departure {
                room_code: code.clone(),
                player: PlayerView::of(&player, room.phase()),
                new_host,
                verdict,
                remaining,
            }
        };

        info!(room = %code, player = %departure.player.id, %connection_id, "player left");
        if departure.remaining.is_none() {
            let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
            if rooms.get(code).is_some_and(|r| Arc::ptr_eq(r, &handle)) {
                rooms.remove(code);
            }
            info!(room = %code, "room destroyed");
        }
        Some(departure)
    }
}
