//! # Authoritative game-state core
//!
//! Canonical state for a turn-based tank game played on a grid: the board and
//! its tiles, one tank per player, the players themselves and the session
//! state machine with its action-point timer.
//!
//! Exactly one process, the authority, mutates this state. Other processes
//! hold read-only replicas rebuilt from [`protocol::Snapshot`]s and
//! [`events::StateEvent`]s. Every mutating operation takes a
//! [`replicated::Caller`] and refuses callers that lack the declared write
//! permission.
//!
//! ## Module Organization
//!
//! - `replicated`: permission-gated values with change observers
//! - `board`, `tile`, `tank`, `player`: the entities
//! - `game`: the active flag and the action-point timer
//! - `session`: the context object owning every entity arena
//! - `events`: composite state events and their publish/subscribe bus
//! - `protocol`: packets sent between the authority and observers
//!
//! ## Usage Example
//!
//! ```rust
//! use shared::replicated::Caller;
//! use shared::session::{Session, SessionConfig};
//! use std::time::Duration;
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.add_player(Caller::Authority, 1)?;
//! session.add_player(Caller::Authority, 2)?;
//! session.start_game(Caller::Authority)?;
//!
//! // Feed elapsed monotonic time from the host loop
//! session.tick(Caller::Authority, Duration::from_millis(16))?;
//! assert_eq!(session.tanks().count(), 2);
//! # Ok::<(), shared::GameError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod board;
pub mod color;
pub mod error;
pub mod events;
pub mod game;
pub mod player;
pub mod protocol;
pub mod replicated;
pub mod session;
pub mod tank;
pub mod tile;

pub use error::{GameError, Result};
pub use events::StateEvent;
pub use protocol::{Packet, Request, Snapshot};
pub use replicated::Caller;
pub use session::{Session, SessionConfig};

pub const DEFAULT_BOARD_SIZE: i32 = 10;
/// Largest width or height a board may have
pub const MAX_BOARD_SIZE: i32 = 64;
pub const DEFAULT_TILE_SCALE: f32 = 1.0;
pub const DEFAULT_TILE_GAP: f32 = 0.1;

/// Identity of a connection, assigned by the transport
pub type ClientId = u32;

/// Opaque handle of a tank in the session arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TankId(pub u32);

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Integer tile coordinate, 0-indexed from the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    /// Placeholder used in error messages for tiles whose position was never set
    pub const UNSET: GridPosition = GridPosition { x: -1, y: -1 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Largest per-axis distance; tiles within `n` form a square of radius `n`
    pub fn chebyshev_distance(&self, other: GridPosition) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
