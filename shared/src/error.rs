//! Error taxonomy for the authoritative game-state core
//!
//! Every variant describes a caller breaking a precondition. None of them is
//! expected in correct operation, so the authority aborts the operation in
//! progress and reports the failure instead of retrying it.

use crate::replicated::Caller;
use crate::{ClientId, GridPosition, TankId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("{caller} is not allowed to {operation}")]
    Permission {
        operation: &'static str,
        caller: Caller,
    },

    #[error("{0} can only be set once")]
    AlreadySet(&'static str),

    #[error("tile {0} already holds a tank, remove it first")]
    AlreadyOccupied(GridPosition),

    #[error("tile {0} is not occupied")]
    NotOccupied(GridPosition),

    #[error("({x}, {y}) is outside the {width}x{height} board")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("the board has not been constructed")]
    NotConstructed,

    #[error("the board has already been constructed")]
    AlreadyConstructed,

    #[error("a {width}x{height} board is too large")]
    BoardTooLarge { width: i32, height: i32 },

    #[error("no free tile found after {0} attempts")]
    PlacementExhausted(u32),

    #[error("unknown axis '{0}'")]
    InvalidAxis(String),

    #[error("unknown policy '{0}'")]
    InvalidPolicy(String),

    #[error("tile {0} is occupied by another tank")]
    TileOccupied(GridPosition),

    #[error("tank {0} does not exist")]
    UnknownTank(TankId),

    #[error("player {0} does not exist")]
    UnknownPlayer(ClientId),

    #[error("player {client} does not control a live tank")]
    NotOwner { client: ClientId },

    #[error("tank {0} has no action points left")]
    InsufficientActionPoints(TankId),

    #[error("{target} is out of range of tank {tank}")]
    OutOfRange { tank: TankId, target: String },
}

pub type Result<T> = std::result::Result<T, GameError>;

impl GameError {
    pub fn permission(operation: &'static str, caller: Caller) -> Self {
        GameError::Permission { operation, caller }
    }
}
