//! Observer-side replica rebuilt from snapshots and state events
//!
//! The mirror never validates anything; it trusts the authority and applies
//! whatever arrives. Events that reference entities it has not seen yet are
//! skipped, and the next periodic snapshot brings it back in line.

use log::debug;
use shared::color::{Rgb, NEUTRAL};
use shared::game::format_countdown;
use shared::protocol::{PlayerView, TankView};
use shared::session::RosterEntry;
use shared::tank::TankStats;
use shared::{ClientId, GridPosition, Snapshot, StateEvent, TankId};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Notices kept for the game info feed
const MAX_NOTICES: usize = 8;

/// A line of the game info feed
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorTank {
    pub id: TankId,
    pub owner: Option<ClientId>,
    pub color: Option<Rgb>,
    pub position: Option<GridPosition>,
    pub stats: TankStats,
}

impl From<TankView> for MirrorTank {
    fn from(view: TankView) -> Self {
        Self {
            id: view.id,
            owner: view.owner,
            color: view.color,
            position: view.position,
            stats: view.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPlayer {
    pub id: ClientId,
    pub name: String,
    pub tank: Option<TankId>,
    pub alive: bool,
}

impl From<PlayerView> for MirrorPlayer {
    fn from(view: PlayerView) -> Self {
        Self {
            id: view.id,
            name: view.name,
            tank: view.tank,
            alive: view.alive,
        }
    }
}

#[derive(Debug, Default)]
pub struct Mirror {
    client_id: Option<ClientId>,
    is_host: bool,
    active: bool,
    width: i32,
    height: i32,
    constructed: bool,
    timer_remaining: f32,
    timer_running: bool,
    players: BTreeMap<ClientId, MirrorPlayer>,
    tanks: BTreeMap<TankId, MirrorTank>,
    notices: VecDeque<Notice>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_identity(&mut self, client_id: ClientId, is_host: bool) {
        self.client_id = Some(client_id);
        self.is_host = is_host;
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn board_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn timer_remaining(&self) -> f32 {
        self.timer_remaining
    }

    pub fn timer_text(&self) -> String {
        format_countdown(self.timer_remaining)
    }

    pub fn player(&self, id: ClientId) -> Option<&MirrorPlayer> {
        self.players.get(&id)
    }

    pub fn tank(&self, id: TankId) -> Option<&MirrorTank> {
        self.tanks.get(&id)
    }

    pub fn tanks(&self) -> impl Iterator<Item = &MirrorTank> {
        self.tanks.values()
    }

    /// The tank this connection controls, if it still has one
    pub fn own_tank(&self) -> Option<&MirrorTank> {
        let player = self.players.get(&self.client_id?)?;
        self.tanks.get(&player.tank?)
    }

    pub fn tank_at(&self, position: GridPosition) -> Option<&MirrorTank> {
        self.tanks
            .values()
            .find(|tank| tank.position == Some(position))
    }

    pub fn owner_name(&self, tank: &MirrorTank) -> Option<&str> {
        let owner = self.players.get(&tank.owner?)?;
        Some(owner.name.as_str())
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Players still in the game followed by eliminated ones
    pub fn roster(&self) -> Vec<RosterEntry> {
        let (mut alive, dead): (Vec<_>, Vec<_>) = self
            .players
            .values()
            .map(|player| RosterEntry {
                player: player.id,
                name: player.name.clone(),
                alive: player.alive,
                color: player
                    .tank
                    .filter(|_| player.alive)
                    .and_then(|tank| self.tanks.get(&tank))
                    .and_then(|tank| tank.color),
            })
            .partition(|entry| entry.alive);

        alive.extend(dead);
        alive
    }

    /// Replaces the whole replica
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.active = snapshot.active;
        self.width = snapshot.width;
        self.height = snapshot.height;
        self.constructed = snapshot.constructed;
        self.timer_remaining = snapshot.timer_remaining;
        self.timer_running = snapshot.timer_running;

        self.players = snapshot
            .players
            .into_iter()
            .map(|view| (view.id, MirrorPlayer::from(view)))
            .collect();
        self.tanks = snapshot
            .tanks
            .into_iter()
            .map(|view| (view.id, MirrorTank::from(view)))
            .collect();
    }

    /// Counts the action-point timer down between snapshots
    pub fn advance(&mut self, elapsed: Duration) {
        if self.timer_running {
            self.timer_remaining = (self.timer_remaining - elapsed.as_secs_f32()).max(0.0);
        }
    }

    pub fn apply_event(&mut self, event: &StateEvent) {
        match event {
            StateEvent::PlayerJoined { player, name } => {
                let alive = !self.active;
                self.players
                    .entry(*player)
                    .and_modify(|existing| existing.name = name.clone())
                    .or_insert_with(|| MirrorPlayer {
                        id: *player,
                        name: name.clone(),
                        tank: None,
                        alive,
                    });
            }
            StateEvent::PlayerLeft { player } => {
                self.players.remove(player);
            }
            StateEvent::NameChanged { player, name } => match self.players.get_mut(player) {
                Some(existing) => existing.name = name.clone(),
                None => debug!("Name change for unknown player {}", player),
            },
            StateEvent::BoardResized { width, height } => {
                self.width = *width;
                self.height = *height;
            }
            StateEvent::MapConstructed { width, height } => {
                self.width = *width;
                self.height = *height;
                self.constructed = true;
            }
            StateEvent::TankSpawned {
                tank,
                owner,
                color,
                position,
            } => {
                self.tanks.insert(
                    *tank,
                    MirrorTank {
                        id: *tank,
                        owner: Some(*owner),
                        color: Some(*color),
                        position: Some(*position),
                        stats: TankStats::default(),
                    },
                );
                if let Some(player) = self.players.get_mut(owner) {
                    player.tank = Some(*tank);
                    player.alive = true;
                }
            }
            StateEvent::TankMoved { tank, to, .. } => match self.tanks.get_mut(tank) {
                Some(existing) => existing.position = Some(*to),
                None => debug!("Move for unknown tank {}", tank),
            },
            StateEvent::TankStatsChanged { tank, stats } => match self.tanks.get_mut(tank) {
                Some(existing) => existing.stats = *stats,
                None => debug!("Stats for unknown tank {}", tank),
            },
            StateEvent::TankDestroyed { tank } => {
                if let Some(destroyed) = self.tanks.remove(tank) {
                    let owner = destroyed.owner.and_then(|id| self.players.get_mut(&id));
                    if let Some(owner) = owner {
                        owner.tank = None;
                    }
                }
            }
            StateEvent::PlayerDied { player } => {
                if let Some(existing) = self.players.get_mut(player) {
                    existing.alive = false;
                }
            }
            StateEvent::GameStarted => {
                self.active = true;
                self.timer_running = true;
                for player in self.players.values_mut() {
                    player.alive = player.alive && player.tank.is_some();
                }
            }
            StateEvent::ActionPointsGranted => {}
            StateEvent::Notice { text, color } => {
                if self.notices.len() == MAX_NOTICES {
                    self.notices.pop_front();
                }
                self.notices.push_back(Notice {
                    text: text.clone(),
                    color: color.unwrap_or(NEUTRAL),
                });
            }
        }
    }
}
