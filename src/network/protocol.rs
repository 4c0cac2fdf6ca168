//! Network protocol message types
//!
//! Length-prefixed JSON messages over TCP: a 4-byte big-endian length
//! followed by a UTF-8 JSON object tagged with `"type"`.

use crate::game::tally::Tally;
use crate::game::view::{PlayerView, RoomView};
use crate::game::{GameError, Phase, PlayerId, RoomCode};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Messages exchanged between clients and the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Message {
    /// Create a room and become its host (client -> server)
    CreateGame { player_name: String },
    /// Join a room by code (client -> server)
    JoinGame {
        player_name: String,
        room_code: String,
    },
    /// Add a word to the lobby's pool (client -> server)
    AddWord { room_code: String, word: String },
    /// Host starts a round (client -> server)
    StartGame { room_code: String },
    /// Move to the next phase (client -> server)
    AdvancePhase { room_code: String, phase: Phase },
    /// Vote for a suspected chameleon (client -> server)
    Vote {
        room_code: String,
        target_player_id: PlayerId,
    },
    /// Chameleon guesses the secret word (client -> server)
    ChameleonGuess { room_code: String, guess: String },
    /// Return the room to its lobby (client -> server)
    NewGame { room_code: String },
    /// Leave the room (client -> server)
    LeaveRoom { room_code: String },
    /// Ping to check connection
    Ping,

    /// Room created (server -> requester)
    GameCreated {
        room_code: RoomCode,
        player: PlayerView,
        game_state: RoomView,
    },
    /// Joined a room (server -> requester)
    GameJoined {
        player: PlayerView,
        game_state: RoomView,
    },
    /// Someone joined (server -> room)
    PlayerJoined {
        player: PlayerView,
        players: Vec<PlayerView>,
    },
    /// Word pool changed (server -> room)
    WordAdded { word: String, words: Vec<String> },
    /// Round started (server -> each player, personalized)
    GameStarted {
        game_state: RoomView,
        is_chameleon: bool,
    },
    /// Phase changed (server -> room)
    PhaseChanged {
        game_phase: Phase,
        game_state: RoomView,
    },
    /// A vote was recorded (server -> room)
    VoteCast {
        voting_results: Tally,
        game_state: RoomView,
    },
    /// Everyone has voted (server -> room, after the reveal delay)
    VotingComplete {
        game_state: RoomView,
        suspected_chameleon: PlayerId,
        actual_chameleon: PlayerView,
    },
    /// The chameleon guessed (server -> room)
    ChameleonGuessed {
        guess: String,
        correct: bool,
        game_state: RoomView,
    },
    /// Room returned to its lobby (server -> room)
    NewGameStarted { game_state: RoomView },
    /// You left the room (server -> requester)
    LeftRoom,
    /// Someone left (server -> room)
    PlayerLeft {
        players: Vec<PlayerView>,
        game_state: RoomView,
    },
    /// Response to ping
    Pong,
    /// A request was refused (server -> requester)
    Error { kind: String, message: String },
}

impl Message {
    /// Build an error reply for a refused request
    pub fn error(err: &GameError) -> Self {
        Message::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    /// Serialize message to bytes (length-prefixed JSON)
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        if json.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
        }
        let len = json.len() as u32;
        let mut bytes = Vec::with_capacity(4 + json.len());
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    /// Write message to a stream
    pub fn write_to<W: Write>(&self, stream: &mut W) -> io::Result<()> {
        stream.write_all(&self.to_bytes()?)?;
        stream.flush()
    }

    /// Read one message from a stream
    pub fn read_from<R: Read>(stream: &mut R) -> io::Result<Self> {
        let body = Self::read_frame(stream)?;
        Ok(Self::from_json(&body)?)
    }

    /// Read one frame's JSON body without decoding it.
    ///
    /// A successful read leaves the stream at the next frame boundary, so a
    /// body that fails to decode can be rejected without closing the
    /// connection.
    pub fn read_frame<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;
        Ok(body)
    }

    /// Decode a frame body
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}
