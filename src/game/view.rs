//! Redacted views of a room
//!
//! The secret word and the chameleon's identity are only disclosed once the
//! round is over. At round start each player additionally gets a private
//! reveal: the word for everyone except the chameleon.

use super::tally::Tally;
use super::{Phase, Player, PlayerId, Room, RoomCode, Winner};
use serde::{Deserialize, Serialize};

/// Who a view is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Shared broadcast to every room member
    Room,
    /// One player's private start-of-round payload
    RoundReveal { is_chameleon: bool },
}

/// What a room member may see of another player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    /// Only present once the round is over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_chameleon: Option<bool>,
}

impl PlayerView {
    /// Render `player` as seen during `phase`.
    pub fn of(player: &Player, phase: Phase) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            is_host: player.is_host,
            is_chameleon: (phase == Phase::GameOver).then_some(player.is_chameleon),
        }
    }
}

/// What a room member may see of the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_code: RoomCode,
    pub players: Vec<PlayerView>,
    pub words: Vec<String>,
    #[serde(rename = "gamePhase")]
    pub phase: Phase,
    pub voting_results: Tally,
    pub winner: Option<Winner>,
    pub chameleon_guess: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_word: Option<String>,
}

impl RoomView {
    /// Project `room` for `viewer`.
    pub fn of(room: &Room, viewer: Viewer) -> Self {
        let phase = room.phase();
        let secret_word = match viewer {
            _ if phase == Phase::GameOver => Some(room.secret_word().to_string()),
            Viewer::RoundReveal { is_chameleon: false } if phase.is_active_round() => {
                Some(room.secret_word().to_string())
            }
            _ => None,
        };

        Self {
            room_code: room.code().clone(),
            players: room
                .players()
                .iter()
                .map(|p| PlayerView::of(p, phase))
                .collect(),
            words: room.words().to_vec(),
            phase,
            voting_results: room.tally(),
            winner: room.winner(),
            chameleon_guess: room.last_guess().to_string(),
            secret_word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::tests::lobby_room;
    use crate::game::ConnectionId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn started_room() -> Room {
        let mut room = lobby_room();
        room.start_game_with_rng(ConnectionId(1), &mut StdRng::seed_from_u64(3))
            .unwrap();
        room
    }

    #[test]
    fn test_lobby_view() {
        let room = lobby_room();
        let view = RoomView::of(&room, Viewer::Room);
        assert_eq!(view.phase, Phase::Lobby);
        assert_eq!(view.players.len(), 3);
        assert_eq!(view.words.len(), 8);
        assert!(view.secret_word.is_none());
        assert!(view.players.iter().all(|p| p.is_chameleon.is_none()));
    }

    #[test]
    fn test_broadcast_hides_round_secrets() {
        let room = started_room();
        let view = RoomView::of(&room, Viewer::Room);
        assert!(view.secret_word.is_none());
        assert!(view.players.iter().all(|p| p.is_chameleon.is_none()));
    }

    #[test]
    fn test_round_reveal_shows_word_to_non_chameleon_only() {
        let room = started_room();
        let player = RoomView::of(&room, Viewer::RoundReveal { is_chameleon: false });
        let chameleon = RoomView::of(&room, Viewer::RoundReveal { is_chameleon: true });

        assert_eq!(player.secret_word.as_deref(), Some(room.secret_word()));
        assert!(chameleon.secret_word.is_none());
        // Identities stay hidden even in the private payload
        assert!(player.players.iter().all(|p| p.is_chameleon.is_none()));
    }

    #[test]
    fn test_round_reveal_in_lobby_has_no_word() {
        let room = lobby_room();
        let view = RoomView::of(&room, Viewer::RoundReveal { is_chameleon: false });
        assert!(view.secret_word.is_none());
    }

    #[test]
    fn test_game_over_reveals_everything() {
        let mut room = started_room();
        let chameleon = room.chameleon().unwrap().connection_id;
        room.remove_player(chameleon).unwrap();
        assert_eq!(room.phase(), Phase::GameOver);

        let view = RoomView::of(&room, Viewer::Room);
        assert_eq!(view.secret_word.as_deref(), Some(room.secret_word()));
        assert!(view.players.iter().all(|p| p.is_chameleon == Some(false)));
        assert_eq!(view.winner, Some(Winner::Players));
    }

    #[test]
    fn test_wire_format() {
        let room = started_room();
        let json = serde_json::to_value(RoomView::of(&room, Viewer::Room)).unwrap();

        assert_eq!(json["roomCode"], "ABC123");
        assert_eq!(json["gamePhase"], "reveal");
        assert_eq!(json["votingResults"], serde_json::json!({}));
        assert_eq!(json["winner"], serde_json::Value::Null);
        assert_eq!(json["chameleonGuess"], "");
        assert!(json.get("secretWord").is_none());
        assert_eq!(json["players"][0]["name"], "Alice");
        assert_eq!(json["players"][0]["isHost"], true);
        assert!(json["players"][0].get("isChameleon").is_none());
    }
}
