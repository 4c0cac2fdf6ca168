//! Room codes: short, shareable identifiers for live rooms

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters a room code is drawn from
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in a room code
pub const CODE_LENGTH: usize = 6;

/// A six character room code made of uppercase letters and digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random code using a specific RNG (for testing/seeding).
    /// Each character is drawn uniformly from [`ALPHABET`].
    pub fn generate_with_rng<R: Rng>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    /// Parse a code typed by a player.
    ///
    /// Surrounding whitespace is ignored and letters are upper-cased, so
    /// " ab12cd" and "AB12CD" name the same room.
    pub fn parse(input: &str) -> Option<Self> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == CODE_LENGTH && code.bytes().all(|b| ALPHABET.contains(&b));
        valid.then_some(RoomCode(code))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
