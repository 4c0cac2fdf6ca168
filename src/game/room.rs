//! The room aggregate and its round state machine
//!
//! ```text
//! lobby --start--> reveal --advance--> discussion --advance--> voting
//! voting --all voted, chameleon caught--> chameleon-guess --guess--> game-over
//! voting --all voted, wrong player--> game-over
//! any --new game--> lobby
//! ```
//!
//! Every operation validates first and mutates only once nothing can fail,
//! so an `Err` always leaves the room untouched.

use super::tally::{self, Tally, Verdict, Votes};
use super::{
    normalize_name, normalize_word, ConnectionId, GameError, GameResult, Phase, Player, PlayerId,
    RoomCode, Winner, MAX_PLAYERS, MAX_TEXT_LEN, MIN_PLAYERS, MIN_WORDS,
};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Result of a completed vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The player who received the most votes
    pub suspect: PlayerId,
    /// The actual chameleon
    pub chameleon: PlayerId,
    pub verdict: Verdict,
}

/// Result of a single vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub tally: Tally,
    /// Whether every player has now voted
    pub complete: bool,
    /// Set when this vote completed the round's voting
    pub resolution: Option<Resolution>,
}

/// How a departure affected a round in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEffect {
    /// No round was running, or nothing needed reconciling
    None,
    /// The chameleon left; the players win by forfeit
    ChameleonLeft,
    /// Too few players remain; the round ends without a winner
    Abandoned,
    /// Votes by or for the departed player were dropped
    VotesDropped { dropped: usize },
    /// Dropping the departed player's vote completed the voting
    Resolved(Resolution),
}

/// A player's removal from a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub player: Player,
    /// The player promoted to host, if the host left
    pub new_host: Option<PlayerId>,
    pub round_effect: RoundEffect,
}

/// One game room: its players, word pool and round state
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    /// Join order
    players: Vec<Player>,
    /// Insertion order, no duplicates
    words: Vec<String>,
    phase: Phase,
    /// Empty outside an active round
    secret_word: String,
    votes: Votes,
    winner: Option<Winner>,
    chameleon_guess: String,
    /// Set once the room has emptied and left the registry
    closed: bool,
}

impl Room {
    /// Create an empty room in the lobby.
    pub fn new(code: RoomCode) -> Self {
        Self {
            code,
            players: Vec::new(),
            words: Vec::new(),
            phase: Phase::Lobby,
            secret_word: String::new(),
            votes: Votes::new(),
            winner: None,
            chameleon_guess: String::new(),
            closed: false,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn secret_word(&self) -> &str {
        &self.secret_word
    }

    #[cfg(test)]
    pub fn votes(&self) -> &Votes {
        &self.votes
    }

    /// Current vote counts, derived from the recorded votes
    pub fn tally(&self) -> Tally {
        self.votes.tally()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// The chameleon's last guess, empty until guessed
    pub fn last_guess(&self) -> &str {
        &self.chameleon_guess
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the room as gone. Only valid once it has no players.
    pub(crate) fn close(&mut self) {
        debug_assert!(self.players.is_empty());
        self.closed = true;
    }

    /// The player bound to `connection_id`
    pub fn player_by_connection(&self, connection_id: ConnectionId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    #[cfg(test)]
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    /// The current round's chameleon
    pub fn chameleon(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_chameleon)
    }

    /// Connections of every player, in join order
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection_id).collect()
    }

    /// Add a player. The first player to join becomes host.
    pub fn add_player_with_rng<R: Rng>(
        &mut self,
        connection_id: ConnectionId,
        name: &str,
        rng: &mut R,
    ) -> GameResult<Player> {
        if self.closed {
            return Err(GameError::NotFound);
        }
        if self.phase != Phase::Lobby {
            return Err(GameError::InvalidState("game already in progress"));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::Full);
        }
        if self.player_by_connection(connection_id).is_some() {
            return Err(GameError::InvalidState("already in this room"));
        }
        let name = normalize_name(name)?;

        let id = loop {
            let id = PlayerId::generate_with_rng(rng);
            if self.player(&id).is_none() {
                break id;
            }
        };
        let player = Player {
            id,
            connection_id,
            name,
            is_host: self.players.is_empty(),
            is_chameleon: false,
        };
        self.players.push(player.clone());
        Ok(player)
    }

    /// Add a word to the pool during the lobby.
    pub fn add_word(&mut self, connection_id: ConnectionId, word: &str) -> GameResult<&[String]> {
        if self.phase != Phase::Lobby {
            return Err(GameError::InvalidState("cannot add words during a round"));
        }
        if self.player_by_connection(connection_id).is_none() {
            return Err(GameError::Forbidden("not a player in this room"));
        }
        let word = normalize_word(word)?;
        if self.words.contains(&word) {
            return Err(GameError::Duplicate(word));
        }
        self.words.push(word);
        Ok(&self.words)
    }

    /// Start a round: pick the chameleon and the secret word.
    pub fn start_game_with_rng<R: Rng>(
        &mut self,
        connection_id: ConnectionId,
        rng: &mut R,
    ) -> GameResult<()> {
        match self.player_by_connection(connection_id) {
            Some(p) if p.is_host => {}
            _ => return Err(GameError::Forbidden("only the host can start the game")),
        }
        if self.phase != Phase::Lobby {
            return Err(GameError::InvalidState("game already in progress"));
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::InvalidState("need at least 3 players"));
        }
        if self.words.len() < MIN_WORDS {
            return Err(GameError::InvalidState("need at least 8 words"));
        }
        let Some(secret_word) = self.words.choose(rng).cloned() else {
            return Err(GameError::InvalidState("need at least 8 words"));
        };

        let chameleon = rng.random_range(0..self.players.len());
        for (i, player) in self.players.iter_mut().enumerate() {
            player.is_chameleon = i == chameleon;
        }
        self.secret_word = secret_word;
        self.votes.clear();
        self.winner = None;
        self.chameleon_guess.clear();
        self.phase = Phase::Reveal;
        Ok(())
    }

    /// Move to `requested` if it is the current phase's manual successor.
    ///
    /// Asking for the current phase is accepted and changes nothing, since
    /// several clients may request the same step at once. Returns whether the
    /// phase changed.
    pub fn advance_phase(&mut self, requested: Phase) -> GameResult<bool> {
        if requested == self.phase {
            return Ok(false);
        }
        if self.phase.manual_successor() != Some(requested) {
            return Err(GameError::InvalidState("illegal phase transition"));
        }
        self.phase = requested;
        Ok(true)
    }

    /// Record a vote and resolve the round once everyone has voted.
    pub fn cast_vote(
        &mut self,
        connection_id: ConnectionId,
        target: &PlayerId,
    ) -> GameResult<VoteOutcome> {
        if self.phase != Phase::Voting {
            return Err(GameError::InvalidState("not in voting phase"));
        }
        let Some(voter) = self.player_by_connection(connection_id) else {
            return Err(GameError::Forbidden("not a player in this room"));
        };
        if &voter.id == target {
            return Err(GameError::InvalidTarget("cannot vote for yourself"));
        }
        if self.player(target).is_none() {
            return Err(GameError::InvalidTarget("no such player in this room"));
        }

        let voter = voter.id.clone();
        self.votes.cast(&voter, target);
        let resolution = self.resolve_if_complete();
        Ok(VoteOutcome {
            tally: self.votes.tally(),
            complete: resolution.is_some(),
            resolution,
        })
    }

    fn resolve_if_complete(&mut self) -> Option<Resolution> {
        if !self.votes.is_complete(self.players.len()) {
            return None;
        }
        let tally = self.votes.tally();
        let suspect = tally.leader()?.clone();
        let chameleon = self.chameleon()?.id.clone();
        let verdict = tally::verdict(&tally, &chameleon);
        match verdict {
            Verdict::Caught => self.phase = Phase::ChameleonGuess,
            Verdict::Escaped => {
                self.phase = Phase::GameOver;
                self.winner = Some(Winner::Chameleon);
            }
        }
        Some(Resolution {
            suspect,
            chameleon,
            verdict,
        })
    }

    /// The caught chameleon's guess at the secret word.
    ///
    /// Matching ignores case and surrounding whitespace. Returns whether the
    /// guess was correct; the round is over either way, so a blank or
    /// over-long guess is just a wrong one.
    pub fn chameleon_guess(&mut self, connection_id: ConnectionId, guess: &str) -> GameResult<bool> {
        if self.phase != Phase::ChameleonGuess {
            return Err(GameError::InvalidState("not in guessing phase"));
        }
        match self.player_by_connection(connection_id) {
            Some(p) if p.is_chameleon => {}
            _ => return Err(GameError::Forbidden("only the chameleon can guess")),
        }
        let guess = guess.trim();

        let correct = guess.to_lowercase() == self.secret_word.trim().to_lowercase();
        self.chameleon_guess = guess.chars().take(MAX_TEXT_LEN).collect();
        self.winner = Some(if correct {
            Winner::Chameleon
        } else {
            Winner::Players
        });
        self.phase = Phase::GameOver;
        Ok(correct)
    }

    /// Return to the lobby, keeping players and words.
    pub fn new_game(&mut self) {
        self.phase = Phase::Lobby;
        self.secret_word.clear();
        self.votes.clear();
        self.winner = None;
        self.chameleon_guess.clear();
        for player in &mut self.players {
            player.is_chameleon = false;
        }
    }

    /// Remove the player bound to `connection_id`.
    ///
    /// Hands the host role to the earliest-joined remaining player and
    /// reconciles a round in progress:
    /// - the chameleon leaving ends the round in the players' favour
    /// - dropping below the minimum player count abandons the round
    /// - otherwise votes by or for the player are dropped, which may complete
    ///   the voting
    pub fn remove_player(&mut self, connection_id: ConnectionId) -> Option<Removal> {
        let index = self
            .players
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        let player = self.players.remove(index);

        let new_host = match self.players.first_mut() {
            Some(first) if player.is_host => {
                first.is_host = true;
                Some(first.id.clone())
            }
            _ => None,
        };

        let round_effect = if self.players.is_empty() || !self.phase.is_active_round() {
            RoundEffect::None
        } else if player.is_chameleon {
            self.phase = Phase::GameOver;
            self.winner = Some(Winner::Players);
            RoundEffect::ChameleonLeft
        } else if self.players.len() < MIN_PLAYERS {
            self.phase = Phase::GameOver;
            self.winner = None;
            RoundEffect::Abandoned
        } else {
            let dropped = self.votes.remove_player(&player.id);
            let resolution = if self.phase == Phase::Voting {
                self.resolve_if_complete()
            } else {
                None
            };
            match resolution {
                Some(resolution) => RoundEffect::Resolved(resolution),
                None if dropped > 0 => RoundEffect::VotesDropped { dropped },
                None => RoundEffect::None,
            }
        };

        Some(Removal {
            player,
            new_host,
            round_effect,
        })
    }
}
