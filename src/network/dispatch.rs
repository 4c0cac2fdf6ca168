//! Request dispatch
//!
//! Turns one client request into a registry call and the messages that call
//! produces. Nothing here touches a socket: the server decides how and when
//! each [`Delivery`] is written.

use super::protocol::Message;
use crate::game::{ConnectionId, GameError, GameResult, RoomCode};
use crate::registry::{Departure, Registry, Snapshot};
use tracing::{debug, warn};

/// A message and the connections it goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: Vec<ConnectionId>,
    pub message: Message,
}

impl Delivery {
    fn reply(connection_id: ConnectionId, message: Message) -> Self {
        Self {
            to: vec![connection_id],
            message,
        }
    }
}

/// Everything a request produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outbound {
    /// Sent as soon as the request is handled, in order
    pub immediate: Vec<Delivery>,
    /// Sent after the vote reveal delay
    pub deferred: Vec<Delivery>,
}

impl Outbound {
    fn send(&mut self, to: Vec<ConnectionId>, message: Message) {
        self.immediate.push(Delivery { to, message });
    }

    fn reply(&mut self, connection_id: ConnectionId, message: Message) {
        self.immediate.push(Delivery::reply(connection_id, message));
    }

    fn broadcast(&mut self, snapshot: &Snapshot, message: Message) {
        self.send(snapshot.members.clone(), message);
    }

    /// Tell the rest of a room that someone left it.
    fn departure(&mut self, departure: Departure) {
        let Some(remaining) = departure.remaining else {
            return;
        };
        self.broadcast(
            &remaining,
            Message::PlayerLeft {
                players: remaining.view.players.clone(),
                game_state: remaining.view.clone(),
            },
        );
        if let Some(verdict) = departure.verdict {
            self.deferred.push(Delivery {
                to: remaining.members,
                message: Message::VotingComplete {
                    game_state: remaining.view,
                    suspected_chameleon: verdict.suspect,
                    actual_chameleon: verdict.chameleon,
                },
            });
        }
    }
}

fn room_code(input: &str) -> GameResult<RoomCode> {
    RoomCode::parse(input).ok_or(GameError::NotFound)
}

/// Handle one request from `connection_id`.
///
/// A refused request produces a single `error` reply to the requester.
pub fn dispatch(registry: &Registry, connection_id: ConnectionId, message: Message) -> Outbound {
    let kind = request_name(&message);
    match handle(registry, connection_id, message) {
        Ok(outbound) => outbound,
        Err(err) => {
            warn!(%connection_id, request = kind, error = %err, "request refused");
            let mut outbound = Outbound::default();
            outbound.reply(connection_id, Message::error(&err));
            outbound
        }
    }
}

/// Reply for a frame that could not be decoded.
pub fn malformed(connection_id: ConnectionId) -> Outbound {
    let err = GameError::InvalidInput("malformed message");
    warn!(%connection_id, error = %err, "request refused");
    let mut outbound = Outbound::default();
    outbound.reply(connection_id, Message::error(&err));
    outbound
}

/// Clean up after a connection closed.
pub fn disconnect(registry: &Registry, connection_id: ConnectionId) -> Outbound {
    let mut outbound = Outbound::default();
    if let Some(departure) = registry.handle_disconnect(connection_id) {
        outbound.departure(departure);
    }
    outbound
}

fn request_name(message: &Message) -> &'static str {
    match message {
        Message::CreateGame { .. } => "create-game",
        Message::JoinGame { .. } => "join-game",
        Message::AddWord { .. } => "add-word",
        Message::StartGame { .. } => "start-game",
        Message::AdvancePhase { .. } => "advance-phase",
        Message::Vote { .. } => "vote",
        Message::ChameleonGuess { .. } => "chameleon-guess",
        Message::NewGame { .. } => "new-game",
        Message::LeaveRoom { .. } => "leave-room",
        Message::Ping => "ping",
        _ => "event",
    }
}

fn handle(registry: &Registry, connection_id: ConnectionId, message: Message) -> GameResult<Outbound> {
    let mut out = Outbound::default();
    match message {
        Message::CreateGame { player_name } => {
            let entered = registry.create_room(connection_id, &player_name)?;
            if let Some(previous) = entered.previous {
                out.departure(previous);
            }
            out.reply(
                connection_id,
                Message::GameCreated {
                    room_code: entered.room_code,
                    player: entered.player,
                    game_state: entered.snapshot.view,
                },
            );
        }

        Message::JoinGame {
            player_name,
            room_code: code,
        } => {
            let code = room_code(&code)?;
            let entered = registry.join_room(connection_id, &player_name, &code)?;
            if let Some(previous) = entered.previous {
                out.departure(previous);
            }
            let snapshot = entered.snapshot;
            out.reply(
                connection_id,
                Message::GameJoined {
                    player: entered.player.clone(),
                    game_state: snapshot.view.clone(),
                },
            );
            out.broadcast(
                &snapshot,
                Message::PlayerJoined {
                    player: entered.player,
                    players: snapshot.view.players.clone(),
                },
            );
        }

        Message::AddWord {
            room_code: code,
            word,
        } => {
            let added = registry.add_word(connection_id, &room_code(&code)?, &word)?;
            out.send(
                added.members,
                Message::WordAdded {
                    word: added.word,
                    words: added.words,
                },
            );
        }

        Message::StartGame { room_code: code } => {
            for reveal in registry.start_game(connection_id, &room_code(&code)?)? {
                out.reply(
                    reveal.connection_id,
                    Message::GameStarted {
                        game_state: reveal.view,
                        is_chameleon: reveal.is_chameleon,
                    },
                );
            }
        }

        Message::AdvancePhase {
            room_code: code,
            phase,
        } => {
            let advanced = registry.advance_phase(&room_code(&code)?, phase)?;
            if advanced.changed {
                let snapshot = advanced.snapshot;
                out.broadcast(
                    &snapshot,
                    Message::PhaseChanged {
                        game_phase: advanced.phase,
                        game_state: snapshot.view.clone(),
                    },
                );
            } else {
                debug!(%connection_id, phase = %advanced.phase, "phase already reached");
            }
        }

        Message::Vote {
            room_code: code,
            target_player_id,
        } => {
            let recorded = registry.cast_vote(connection_id, &room_code(&code)?, &target_player_id)?;
            let snapshot = recorded.snapshot;
            out.broadcast(
                &snapshot,
                Message::VoteCast {
                    voting_results: recorded.tally,
                    game_state: snapshot.view.clone(),
                },
            );
            if let Some(verdict) = recorded.verdict {
                out.deferred.push(Delivery {
                    to: snapshot.members,
                    message: Message::VotingComplete {
                        game_state: snapshot.view,
                        suspected_chameleon: verdict.suspect,
                        actual_chameleon: verdict.chameleon,
                    },
                });
            }
        }

        Message::ChameleonGuess {
            room_code: code,
            guess,
        } => {
            let made = registry.chameleon_guess(connection_id, &room_code(&code)?, &guess)?;
            out.broadcast(
                &made.snapshot,
                Message::ChameleonGuessed {
                    guess: made.guess,
                    correct: made.correct,
                    game_state: made.snapshot.view.clone(),
                },
            );
        }

        Message::NewGame { room_code: code } => {
            let snapshot = registry.new_game(&room_code(&code)?)?;
            out.broadcast(
                &snapshot,
                Message::NewGameStarted {
                    game_state: snapshot.view.clone(),
                },
            );
        }

        Message::LeaveRoom { room_code: code } => {
            let departure = registry.leave_room(connection_id, &room_code(&code)?)?;
            out.reply(connection_id, Message::LeftRoom);
            out.departure(departure);
        }

        Message::Ping => out.reply(connection_id, Message::Pong),

        _ => return Err(GameError::InvalidInput("unexpected message type")),
    }
    Ok(out)
}
