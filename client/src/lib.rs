//! # Tank Game Console Client
//!
//! A headless observer and controller for the turn-based tank game. The
//! client never writes game state; it keeps a read-only replica built from
//! what the authority sends and turns typed commands into requests.
//!
//! ## Architecture Overview
//!
//! ### Replica
//! On connect the server sends a full snapshot. After that every published
//! state event is applied as it arrives, and a periodic snapshot replaces
//! the replica wholesale so a lost datagram never leaves it stale for long.
//!
//! ### Requests
//! Commands become numbered requests. The server either applies one or
//! answers with a rejection carrying the reason, which the client matches
//! back to the command that caused it.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! Observer-side replica of players, tanks, board and timer, plus the game
//! info feed.
//!
//! ### Input Module (`input`)
//! Console command parsing and request sequencing.
//!
//! ### Display Module (`display`)
//! Text for the timer, the tank info panel, the roster and event lines.
//!
//! ### Network Module (`network`)
//! UDP connection handling and the main loop.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::input::{parse_command, Command};
//! use client::mirror::Mirror;
//! use shared::{Request, StateEvent};
//!
//! let mut mirror = Mirror::new();
//! mirror.apply_event(&StateEvent::BoardResized { width: 8, height: 8 });
//! assert_eq!(mirror.board_size(), (8, 8));
//!
//! assert_eq!(
//!     parse_command("move 2 3").unwrap(),
//!     Command::Send(Request::Move { x: 1, y: 2 })
//! );
//! ```

pub mod display;
pub mod input;
pub mod mirror;
pub mod network;
