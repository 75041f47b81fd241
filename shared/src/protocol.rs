//! Datagrams exchanged between the authority and its observers
//!
//! Every datagram is one `bincode`-encoded [`Packet`].

use crate::board::Axis;
use crate::color::Rgb;
use crate::events::StateEvent;
use crate::tank::TankStats;
use crate::{ClientId, GridPosition, TankId};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side expects to receive
pub const MAX_PACKET_SIZE: usize = 8192;

/// Most players a session holds while a full snapshot fits in one datagram
pub const MAX_PLAYERS: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Connect {
        client_version: u32,
        screen_name: String,
    },
    Request {
        sequence: u32,
        request: Request,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: ClientId,
        is_host: bool,
    },
    Snapshot(Snapshot),
    Event(StateEvent),
    Rejected {
        sequence: u32,
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Something a player asks the authority to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    SetName(String),
    StartGame,
    ResizeBoard { axis: Axis, delta: i32 },
    Move { x: i32, y: i32 },
    UpgradeRange,
    Attack { target: TankId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: ClientId,
    pub name: String,
    pub tank: Option<TankId>,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankView {
    pub id: TankId,
    pub owner: Option<ClientId>,
    pub color: Option<Rgb>,
    pub position: Option<GridPosition>,
    pub stats: TankStats,
}

/// Everything an observer needs to rebuild its replica from scratch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub active: bool,
    pub width: i32,
    pub height: i32,
    pub constructed: bool,
    pub timer_remaining: f32,
    pub timer_running: bool,
    pub players: Vec<PlayerView>,
    pub tanks: Vec<TankView>,
}

pub fn encode(packet: &Packet) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

pub fn decode(bytes: &[u8]) -> bincode::Result<Packet> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicated::Caller;
    use crate::session::{Session, SessionConfig};

    #[test]
    fn test_request_packet() {
        let packet = Packet::Request {
            sequence: 9,
            request: Request::ResizeBoard {
                axis: Axis::Y,
                delta: -1,
            },
        };

        match decode(&encode(&packet).unwrap()).unwrap() {
            Packet::Request { sequence, request } => {
                assert_eq!(sequence, 9);
                assert_eq!(
                    request,
                    Request::ResizeBoard {
                        axis: Axis::Y,
                        delta: -1
                    }
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_full_board_snapshot_fits_in_datagram() {
        let mut session = Session::new(SessionConfig {
            seed: Some(3),
            ..SessionConfig::default()
        });
        for id in 1..=16 {
            session.add_player(Caller::Authority, id).unwrap();
        }
        session.start_game(Caller::Authority).unwrap();

        let bytes = encode(&Packet::Snapshot(session.snapshot())).unwrap();
        assert!(bytes.len() < MAX_PACKET_SIZE);
    }

    #[test]
    fn test_longest_names_still_fit_in_datagram() {
        let mut session = Session::new(SessionConfig {
            board_width: crate::MAX_BOARD_SIZE,
            board_height: crate::MAX_BOARD_SIZE,
            seed: Some(9),
            ..SessionConfig::default()
        });
        let name = "\u{1F600}".repeat(4500);
        for id in 1..=MAX_PLAYERS as ClientId {
            session.add_player(Caller::Authority, id).unwrap();
            session
                .set_player_name(Caller::Client(id), id, &name)
                .unwrap();
        }
        session.start_game(Caller::Authority).unwrap();

        let bytes = encode(&Packet::Snapshot(session.snapshot())).unwrap();
        assert!(bytes.len() <= MAX_PACKET_SIZE, "snapshot is {} bytes", bytes.len());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode(&[0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
