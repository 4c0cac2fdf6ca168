//! Error taxonomy for room and game operations

/// Alias for `Result<T, GameError>`.
pub type GameResult<T> = Result<T, GameError>;

/// Why a request against a room was refused.
///
/// Every variant is an expected, per-request outcome. A returned error means
/// the room was left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// No live room has the requested code
    #[error("room not found")]
    NotFound,

    /// The action is not legal in the current phase or the room lacks
    /// the players/words it needs
    #[error("{0}")]
    InvalidState(&'static str),

    /// The caller does not hold the role the action requires
    #[error("{0}")]
    Forbidden(&'static str),

    /// The vote target is the voter or is not in the room
    #[error("{0}")]
    InvalidTarget(&'static str),

    /// The word is already in the room's pool
    #[error("word already exists: \"{0}\"")]
    Duplicate(String),

    /// The room already holds the maximum number of players
    #[error("room is full")]
    Full,

    /// No unused room code could be generated
    #[error("no room codes available")]
    ResourceExhausted,

    /// A name, word or guess was empty or too long
    #[error("{0}")]
    InvalidInput(&'static str),
}

impl GameError {
    /// Stable machine-readable code for this error kind
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::NotFound => "not-found",
            GameError::InvalidState(_) => "invalid-state",
            GameError::Forbidden(_) => "forbidden",
            GameError::InvalidTarget(_) => "invalid-target",
            GameError::Duplicate(_) => "duplicate",
            GameError::Full => "full",
            GameError::ResourceExhausted => "resource-exhausted",
            GameError::InvalidInput(_) => "invalid-input",
        }
    }
}
