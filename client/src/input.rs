//! Console command parsing with request sequencing
//!
//! Coordinates typed by the player are 1-indexed, matching what the display
//! shows; they are converted to 0-indexed grid positions here.

use shared::board::Axis;
use shared::{GameError, Packet, Request, TankId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Forward a request to the authority
    Send(Request),
    /// Attack whichever tank stands on a tile (0-indexed)
    AttackTile { x: i32, y: i32 },
    Status,
    Roster,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command '{0}', type 'help' for a list")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error(transparent)]
    Game(#[from] GameError),
}

pub const HELP: &str = "\
commands:
  name <screen name>     change your screen name
  start                  start the game (host only)
  resize <x|y> <delta>   grow or shrink the board before the game starts (host only)
  move <x> <y>           move your tank to an adjacent tile
  upgrade                trade one action point for one range
  attack <#id | x y>     fire at a tank by id or by tile
  status                 show the board, timer and your tank
  roster                 list alive and eliminated players
  quit                   leave the game";

fn number(word: &str) -> Result<i32, InputError> {
    word.parse()
        .map_err(|_| InputError::NotANumber(word.to_string()))
}

/// Parses a 1-indexed board coordinate into the 0-indexed grid value
fn coordinate(word: &str) -> Result<i32, InputError> {
    number(word)?
        .checked_sub(1)
        .ok_or_else(|| InputError::NotANumber(word.to_string()))
}

/// Parses one line typed at the console
pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Status);
    };
    let args: Vec<&str> = words.collect();

    match (verb.to_lowercase().as_str(), args.as_slice()) {
        ("name", []) => Err(InputError::Usage("name <screen name>")),
        ("name", _) => Ok(Command::Send(Request::SetName(args.join(" ")))),
        ("start", []) => Ok(Command::Send(Request::StartGame)),
        ("resize", [axis, delta]) => Ok(Command::Send(Request::ResizeBoard {
            axis: axis.parse::<Axis>()?,
            delta: number(delta)?,
        })),
        ("resize", _) => Err(InputError::Usage("resize <x|y> <delta>")),
        ("move", [x, y]) => Ok(Command::Send(Request::Move {
            x: coordinate(x)?,
            y: coordinate(y)?,
        })),
        ("move", _) => Err(InputError::Usage("move <x> <y>")),
        ("upgrade", []) => Ok(Command::Send(Request::UpgradeRange)),
        ("attack", [id]) => {
            let id = id.trim_start_matches('#');
            let target = id
                .parse::<u32>()
                .map_err(|_| InputError::NotANumber(id.to_string()))?;
            Ok(Command::Send(Request::Attack {
                target: TankId(target),
            }))
        }
        ("attack", [x, y]) => Ok(Command::AttackTile {
            x: coordinate(x)?,
            y: coordinate(y)?,
        }),
        ("attack", _) => Err(InputError::Usage("attack <#id | x y>")),
        ("status", []) => Ok(Command::Status),
        ("roster", []) => Ok(Command::Roster),
        ("help", _) | ("?", _) => Ok(Command::Help),
        ("quit", _) | ("exit", _) => Ok(Command::Quit),
        _ => Err(InputError::UnknownCommand(line.trim().to_string())),
    }
}

/// Numbers outgoing requests and remembers them until the server answers
pub struct InputManager {
    next_sequence: u32,
    pending: HashMap<u32, Request>,
}

impl InputManager {
    /// Requests remembered for rejection reports
    const MAX_PENDING: usize = 64;

    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            pending: HashMap::new(),
        }
    }

    /// Wraps a request in a packet with the next sequence number
    pub fn package(&mut self, request: Request) -> Packet {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.pending.len() >= Self::MAX_PENDING {
            let oldest = sequence.saturating_sub(Self::MAX_PENDING as u32);
            self.pending.retain(|&seq, _| seq > oldest);
        }
        self.pending.insert(sequence, request.clone());

        Packet::Request { sequence, request }
    }

    /// The request a rejection refers to
    pub fn rejected(&mut self, sequence: u32) -> Option<Request> {
        self.pending.remove(&sequence)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_commands() {
        assert_eq!(
            parse_command("start"),
            Ok(Command::Send(Request::StartGame))
        );
        assert_eq!(
            parse_command("name  Big  Tank "),
            Ok(Command::Send(Request::SetName("Big Tank".into())))
        );
        assert_eq!(
            parse_command("resize Y -2"),
            Ok(Command::Send(Request::ResizeBoard {
                axis: Axis::Y,
                delta: -2
            }))
        );
    }

    #[test]
    fn test_coordinates_are_one_indexed() {
        assert_eq!(
            parse_command("move 1 3"),
            Ok(Command::Send(Request::Move { x: 0, y: 2 }))
        );
        assert_eq!(
            parse_command("attack 4 4"),
            Ok(Command::AttackTile { x: 3, y: 3 })
        );
    }

    #[test]
    fn test_coordinate_underflow() {
        assert_eq!(
            parse_command("move -2147483648 1"),
            Err(InputError::NotANumber("-2147483648".into()))
        );
        assert_eq!(
            parse_command("attack 1 -2147483648"),
            Err(InputError::NotANumber("-2147483648".into()))
        );
    }

    #[test]
    fn test_attack_by_id() {
        assert_eq!(
            parse_command("attack #7"),
            Ok(Command::Send(Request::Attack { target: TankId(7) }))
        );
        assert_eq!(
            parse_command("ATTACK 2"),
            Ok(Command::Send(Request::Attack { target: TankId(2) }))
        );
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(
            parse_command("resize z 1"),
            Err(InputError::Game(GameError::InvalidAxis("z".into())))
        );
        assert_eq!(
            parse_command("move one 2"),
            Err(InputError::NotANumber("one".into()))
        );
        assert_eq!(
            parse_command("move 1"),
            Err(InputError::Usage("move <x> <y>"))
        );
        assert!(matches!(
            parse_command("dance"),
            Err(InputError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_blank_line_shows_status() {
        assert_eq!(parse_command("   "), Ok(Command::Status));
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_sequences_increase_and_rejections_resolve() {
        let mut input_manager = InputManager::new();

        let first = input_manager.package(Request::StartGame);
        let second = input_manager.package(Request::UpgradeRange);
        assert!(matches!(first, Packet::Request { sequence: 1, .. }));
        assert!(matches!(second, Packet::Request { sequence: 2, .. }));

        assert_eq!(input_manager.rejected(2), Some(Request::UpgradeRange));
        assert_eq!(input_manager.rejected(2), None);
    }

    #[test]
    fn test_pending_requests_are_bounded() {
        let mut input_manager = InputManager::new();
        for _ in 0..200 {
            input_manager.package(Request::UpgradeRange);
        }
        assert!(input_manager.pending.len() <= InputManager::MAX_PENDING + 1);
        assert_eq!(input_manager.rejected(200), Some(Request::UpgradeRange));
        assert_eq!(input_manager.rejected(1), None);
    }
}
