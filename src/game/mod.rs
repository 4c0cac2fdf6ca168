//! Game logic: players, phases, rooms, vote tallies and redacted views

pub mod code;
pub mod error;
pub mod room;
pub mod tally;
pub mod view;

pub use code::RoomCode;
pub use error::{GameError, GameResult};
pub use room::Room;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of players to start a round
pub const MIN_PLAYERS: usize = 3;

/// Maximum number of players in a room
pub const MAX_PLAYERS: usize = 8;

/// Minimum number of words in the pool to start a round
pub const MIN_WORDS: usize = 8;

/// Maximum length (in characters) of names, words and guesses
pub const MAX_TEXT_LEN: usize = 20;

const PLAYER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PLAYER_ID_LENGTH: usize = 9;

/// Transport-level identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stable identifier of a player within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap an existing identifier.
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    /// Generate a random lowercase base-36 identifier.
    pub fn generate_with_rng<R: Rng>(rng: &mut R) -> Self {
        let id = (0..PLAYER_ID_LENGTH)
            .map(|_| PLAYER_ID_ALPHABET[rng.random_range(0..PLAYER_ID_ALPHABET.len())] as char)
            .collect();
        PlayerId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of a room's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Collecting players and words
    Lobby,
    /// Players are looking at the secret word (or their chameleon card)
    Reveal,
    /// Players give clues
    Discussion,
    /// Players vote for who they think the chameleon is
    Voting,
    /// The caught chameleon gets one guess at the secret word
    ChameleonGuess,
    /// Round finished, everything is revealed
    GameOver,
}

impl Phase {
    /// Whether a round is in progress (a chameleon and secret word exist)
    pub fn is_active_round(self) -> bool {
        matches!(
            self,
            Phase::Reveal | Phase::Discussion | Phase::Voting | Phase::ChameleonGuess
        )
    }

    /// The phase players may move to by asking for it directly.
    ///
    /// Every other transition is driven by the game itself (start, votes,
    /// guesses, new game).
    pub fn manual_successor(self) -> Option<Phase> {
        match self {
            Phase::Reveal => Some(Phase::Discussion),
            Phase::Discussion => Some(Phase::Voting),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Reveal => "reveal",
            Phase::Discussion => "discussion",
            Phase::Voting => "voting",
            Phase::ChameleonGuess => "chameleon-guess",
            Phase::GameOver => "game-over",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who won a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Winner {
    Chameleon,
    Players,
}

/// A player in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable id, assigned on join
    pub id: PlayerId,
    /// Connection currently bound to this player
    pub connection_id: ConnectionId,
    /// Display name (1-20 chars)
    pub name: String,
    /// Whether this player is the room's host
    pub is_host: bool,
    /// Whether this player is the chameleon in the current round
    pub is_chameleon: bool,
}

/// Trim `input` and check it is 1..=[`MAX_TEXT_LEN`] characters long.
fn normalize_text(
    input: &str,
    empty: &'static str,
    too_long: &'static str,
) -> GameResult<String> {
    let text = input.trim();
    if text.is_empty() {
        return Err(GameError::InvalidInput(empty));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(GameError::InvalidInput(too_long));
    }
    Ok(text.to_string())
}

/// Normalize a display name.
pub fn normalize_name(input: &str) -> GameResult<String> {
    normalize_text(
        input,
        "name must not be empty",
        "name must be at most 20 characters",
    )
}

/// Normalize a word submitted to the pool.
pub fn normalize_word(input: &str) -> GameResult<String> {
    normalize_text(
        input,
        "word must not be empty",
        "word must be at most 20 characters",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_player_id_shape() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let id = PlayerId::generate_with_rng(&mut rng);
            assert_eq!(id.as_str().len(), PLAYER_ID_LENGTH);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_string(&Phase::ChameleonGuess).unwrap(),
            r#""chameleon-guess""#
        );
        assert_eq!(
            serde_json::from_str::<Phase>(r#""game-over""#).unwrap(),
            Phase::GameOver
        );
        assert!(serde_json::from_str::<Phase>(r#""intermission""#).is_err());
        for phase in [
            Phase::Lobby,
            Phase::Reveal,
            Phase::Discussion,
            Phase::Voting,
            Phase::ChameleonGuess,
            Phase::GameOver,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase));
        }
    }

    #[test]
    fn test_active_round_phases() {
        assert!(!Phase::Lobby.is_active_round());
        assert!(Phase::Reveal.is_active_round());
        assert!(Phase::Discussion.is_active_round());
        assert!(Phase::Voting.is_active_round());
        assert!(Phase::ChameleonGuess.is_active_round());
        assert!(!Phase::GameOver.is_active_round());
    }

    #[test]
    fn test_manual_successors() {
        assert_eq!(Phase::Reveal.manual_successor(), Some(Phase::Discussion));
        assert_eq!(Phase::Discussion.manual_successor(), Some(Phase::Voting));
        assert_eq!(Phase::Voting.manual_successor(), None);
        assert_eq!(Phase::Lobby.manual_successor(), None);
    }

    #[test]
    fn test_normalize_trims() {
        assert_eq!(normalize_name("  Alice ").unwrap(), "Alice");
        assert_eq!(normalize_word("\tapple\n").unwrap(), "apple");
    }

    #[test]
    fn test_normalize_limits() {
        assert!(matches!(normalize_name("   "), Err(GameError::InvalidInput(_))));
        assert!(normalize_word(&"a".repeat(MAX_TEXT_LEN)).is_ok());
        assert!(matches!(
            normalize_word(&"a".repeat(MAX_TEXT_LEN + 1)),
            Err(GameError::InvalidInput(_))
        ));
        // Limit counts characters, not bytes
        assert!(normalize_name(&"é".repeat(MAX_TEXT_LEN)).is_ok());
    }
}
