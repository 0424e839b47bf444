//! Command errors reported back to the originating player

use std::fmt;

/// Resource a placement is paid from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Sun,
    WaveBudget,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Sun => f.write_str("sun"),
            Resource::WaveBudget => f.write_str("wave budget"),
        }
    }
}

/// Why a command was rejected. A rejected command leaves the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game not found")]
    NotFound,

    #[error("Game is full")]
    Full,

    #[error("Not allowed right now: {0}")]
    InvalidState(&'static str),

    #[error("Position is outside the lawn")]
    InvalidPosition,

    #[error("Spot already taken")]
    SpotTaken,

    #[error("Not enough {0}")]
    InsufficientResource(Resource),

    /// The room task has already shut down
    #[error("Game is no longer running")]
    Closed,
}

impl GameError {
    /// Stable machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotFound | GameError::Closed => "not_found",
            GameError::Full => "full",
            GameError::InvalidState(_) => "invalid_state",
            GameError::InvalidPosition => "invalid_position",
            GameError::SpotTaken => "spot_taken",
            GameError::InsufficientResource(_) => "insufficient_resource",
        }
    }
}
