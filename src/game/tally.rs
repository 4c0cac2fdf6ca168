//! Vote tallying
//!
//! Votes are kept in the order voters first voted. The tally is always
//! recomputed from the votes, never updated incrementally, so it can be
//! re-derived at any time.

use super::PlayerId;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One vote per voter, mapping voter to target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Votes {
    entries: Vec<(PlayerId, PlayerId)>,
}

impl Votes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `voter`'s vote for `target`.
    ///
    /// A voter who votes again replaces their earlier choice but keeps their
    /// original position. Returns true if an earlier vote was replaced.
    pub fn cast(&mut self, voter: &PlayerId, target: &PlayerId) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|(v, _)| v == voter) {
            entry.1 = target.clone();
            return true;
        }
        self.entries.push((voter.clone(), target.clone()));
        false
    }

    /// The target `voter` currently votes for.
    #[cfg(test)]
    pub fn target_of(&self, voter: &PlayerId) -> Option<&PlayerId> {
        self.entries
            .iter()
            .find(|(v, _)| v == voter)
            .map(|(_, t)| t)
    }

    /// Drop every vote cast by or for `player`. Returns how many were dropped.
    pub fn remove_player(&mut self, player: &PlayerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(v, t)| v != player && t != player);
        before - self.entries.len()
    }

    /// Whether every one of `player_count` players has voted.
    pub fn is_complete(&self, player_count: usize) -> bool {
        player_count > 0 && self.entries.len() == player_count
    }

    /// Count votes per target.
    pub fn tally(&self) -> Tally {
        let mut counts: Vec<(PlayerId, u32)> = Vec::new();
        for (_, target) in &self.entries {
            match counts.iter_mut().find(|(t, _)| t == target) {
                Some((_, count)) => *count += 1,
                None => counts.push((target.clone(), 1)),
            }
        }
        Tally { counts }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate `(voter, target)` pairs in voting order.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &PlayerId)> {
        self.entries.iter().map(|(v, t)| (v, t))
    }
}

/// Vote counts per target, in the order targets first received a vote.
///
/// Serialized as a JSON object `{ targetId: count }` in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(PlayerId, u32)>,
}

impl Tally {
    /// Votes received by `target`.
    #[cfg(test)]
    pub fn count_for(&self, target: &PlayerId) -> u32 {
        self.counts
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Total number of votes counted.
    #[cfg(test)]
    pub fn total(&self) -> u32 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// The target with the most votes.
    ///
    /// Ties go to the target that received its first vote earliest.
    pub fn leader(&self) -> Option<&PlayerId> {
        let max = self.counts.iter().map(|(_, c)| *c).max()?;
        self.counts
            .iter()
            .find(|(_, c)| *c == max)
            .map(|(t, _)| t)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, u32)> {
        self.counts.iter().map(|(t, c)| (t, *c))
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (target, count) in &self.counts {
            map.serialize_entry(target, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TallyVisitor;

        impl<'de> Visitor<'de> for TallyVisitor {
            type Value = Tally;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of player ids to vote counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Tally, A::Error> {
                let mut counts = Vec::new();
                while let Some((target, count)) = access.next_entry::<PlayerId, u32>()? {
                    counts.push((target, count));
                }
                Ok(Tally { counts })
            }
        }

        deserializer.deserialize_map(TallyVisitor)
    }
}

/// Outcome of a completed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The most-voted player is the chameleon
    Caught,
    /// The players picked someone else
    Escaped,
}

/// Decide whether the players caught `chameleon`.
pub fn verdict(tally: &Tally, chameleon: &PlayerId) -> Verdict {
    match tally.leader() {
        Some(suspect) if suspect == chameleon => Verdict::Caught,
        _ => Verdict::Escaped,
    }
}
