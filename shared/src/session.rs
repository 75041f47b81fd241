//! The session context: one authoritative copy of board, tanks, players and game
//!
//! Entities live in arenas keyed by opaque handles ([`TankId`], [`ClientId`]).
//! Cross-references between them are handles, so a reference to a destroyed
//! tank resolves to [`GameError::UnknownTank`] instead of dangling.
//!
//! Every mutating entry point takes the [`Caller`] performing it. Canonical
//! state changes require `Caller::Authority`; the two exceptions are renaming,
//! which belongs to the player's own connection, and starting the game, which
//! quietly does nothing for anyone but the authority.

use crate::board::{Axis, Board, PlacementPolicy};
use crate::color::{ColorPolicy, Rgb};
use crate::error::{GameError, Result};
use crate::events::{EventBus, StateEvent, Topic};
use crate::game::{Game, DEFAULT_ACTION_POINT_PERIOD};
use crate::player::Player;
use crate::protocol::{PlayerView, Snapshot, TankView};
use crate::replicated::{check_permission, Caller, SubscriptionId, WritePermission};
use crate::tank::{Tank, TankStats};
use crate::{ClientId, GridPosition, TankId, DEFAULT_BOARD_SIZE, DEFAULT_TILE_GAP, DEFAULT_TILE_SCALE};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::time::Duration;

/// Damage dealt by one attack
pub const ATTACK_DAMAGE: i32 = 1;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub board_width: i32,
    pub board_height: i32,
    pub tile_scale: f32,
    pub tile_gap: f32,
    pub action_point_period: Duration,
    pub placement: PlacementPolicy,
    pub color: ColorPolicy,
    /// Seed for spawn placement and colors; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_width: DEFAULT_BOARD_SIZE,
            board_height: DEFAULT_BOARD_SIZE,
            tile_scale: DEFAULT_TILE_SCALE,
            tile_gap: DEFAULT_TILE_GAP,
            action_point_period: DEFAULT_ACTION_POINT_PERIOD,
            placement: PlacementPolicy::default(),
            color: ColorPolicy::default(),
            seed: None,
        }
    }
}

/// One entry of the alive/dead player list
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub player: ClientId,
    pub name: String,
    pub alive: bool,
    pub color: Option<Rgb>,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    board: Board,
    game: Game,
    players: BTreeMap<ClientId, Player>,
    tanks: BTreeMap<TankId, Tank>,
    next_tank_id: u32,
    rng: StdRng,
    events: EventBus,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            board: Board::new(
                config.board_width,
                config.board_height,
                config.tile_scale,
                config.tile_gap,
            ),
            game: Game::new(config.action_point_period),
            players: BTreeMap::new(),
            tanks: BTreeMap::new(),
            next_tank_id: 1,
            rng,
            events: EventBus::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn is_active(&self) -> bool {
        self.game.is_active()
    }

    pub fn player(&self, id: ClientId) -> Result<&Player> {
        self.players.get(&id).ok_or(GameError::UnknownPlayer(id))
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn tank(&self, id: TankId) -> Result<&Tank> {
        self.tanks.get(&id).ok_or(GameError::UnknownTank(id))
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.values()
    }

    pub fn subscribe(
        &mut self,
        topic: Option<Topic>,
        subscriber: impl FnMut(&StateEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(topic, subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Watches one tank's stats field directly
    pub fn observe_tank_stats(
        &mut self,
        tank: TankId,
        observer: impl FnMut(&TankStats, &TankStats) + Send + 'static,
    ) -> Result<SubscriptionId> {
        let tank = self.tanks.get_mut(&tank).ok_or(GameError::UnknownTank(tank))?;
        Ok(tank.subscribe_stats(observer))
    }

    /// Watches one player's screen name directly
    pub fn observe_player_name(
        &mut self,
        player: ClientId,
        observer: impl FnMut(&String, &String) + Send + 'static,
    ) -> Result<SubscriptionId> {
        let player = self
            .players
            .get_mut(&player)
            .ok_or(GameError::UnknownPlayer(player))?;
        Ok(player.subscribe_name(observer))
    }

    fn require_authority(caller: Caller, operation: &'static str) -> Result<()> {
        check_permission(WritePermission::Authority, None, caller, operation)
    }

    // Player lifecycle

    /// Registers the player for a newly connected client
    pub fn add_player(&mut self, caller: Caller, id: ClientId) -> Result<()> {
        Self::require_authority(caller, "add a player")?;
        if self.players.contains_key(&id) {
            return Err(GameError::AlreadySet("player"));
        }

        let player = Player::new(id);
        let name = player.screen_name().to_string();
        self.players.insert(id, player);

        info!("Player {} joined", id);
        self.events.publish(StateEvent::PlayerJoined { player: id, name });
        Ok(())
    }

    /// Handles a disconnection: the player dies, then leaves the session
    pub fn remove_player(&mut self, caller: Caller, id: ClientId) -> Result<()> {
        Self::require_authority(caller, "remove a player")?;
        self.kill_player(caller, id)?;
        self.players.remove(&id);

        info!("Player {} left", id);
        self.events.publish(StateEvent::PlayerLeft { player: id });
        Ok(())
    }

    /// Renames a player; a caller other than the player's connection is ignored
    pub fn set_player_name(&mut self, caller: Caller, id: ClientId, name: &str) -> Result<bool> {
        let player = self.players.get_mut(&id).ok_or(GameError::UnknownPlayer(id))?;
        if !player.set_name(caller, name) {
            return Ok(false);
        }

        let name = player.screen_name().to_string();
        debug!("Player {} is now called {:?}", id, name);
        self.events.publish(StateEvent::NameChanged { player: id, name });
        Ok(true)
    }

    /// Kills a player, destroying its tank; returns false if already dead
    pub fn kill_player(&mut self, caller: Caller, id: ClientId) -> Result<bool> {
        Self::require_authority(caller, "kill a player")?;
        let player = self.player(id)?;
        if player.is_dead() {
            return Ok(false);
        }

        if let Some(tank) = player.tank() {
            if self.tanks.contains_key(&tank) {
                self.destroy_tank(caller, tank)?;
            }
        }
        self.mark_player_dead(caller, id)?;
        Ok(true)
    }

    fn mark_player_dead(&mut self, caller: Caller, id: ClientId) -> Result<()> {
        let player = self.players.get_mut(&id).ok_or(GameError::UnknownPlayer(id))?;
        if player.mark_dead(caller)? {
            info!("Player {} died", id);
            self.events.publish(StateEvent::PlayerDied { player: id });
        }
        Ok(())
    }

    pub fn is_player_alive(&self, id: ClientId) -> Result<bool> {
        Ok(self.player(id)?.is_alive(self.is_active()))
    }

    /// Players still in the game followed by eliminated ones
    pub fn roster(&self) -> Vec<RosterEntry> {
        let active = self.is_active();
        let (mut alive, dead): (Vec<_>, Vec<_>) = self
            .players
            .values()
            .map(|player| {
                let alive = player.is_alive(active);
                let color = player
                    .tank()
                    .filter(|_| alive)
                    .and_then(|tank| self.tanks.get(&tank))
                    .and_then(Tank::color);
                RosterEntry {
                    player: player.id(),
                    name: player.screen_name().to_string(),
                    alive,
                    color,
                }
            })
            .partition(|entry| entry.alive);

        alive.extend(dead);
        alive
    }

    // Board

    pub fn change_board_size(&mut self, caller: Caller, axis: Axis, delta: i32) -> Result<i32> {
        let size = self.board.change_size(caller, axis, delta)?;
        let (width, height) = self.board.size();
        self.events.publish(StateEvent::BoardResized { width, height });
        Ok(size)
    }

    pub fn construct_map(&mut self, caller: Caller) -> Result<()> {
        self.board.construct_map(caller)?;
        let (width, height) = self.board.size();
        self.events.publish(StateEvent::MapConstructed { width, height });
        Ok(())
    }

    /// Gives every living player without a tank a freshly placed one
    pub fn spawn_players(
        &mut self,
        caller: Caller,
        placement: PlacementPolicy,
        color: ColorPolicy,
    ) -> Result<Vec<TankId>> {
        Self::require_authority(caller, "spawn players")?;
        if !self.board.is_constructed() {
            return Err(GameError::NotConstructed);
        }

        let waiting: Vec<ClientId> = self
            .players
            .values()
            .filter(|player| player.tank().is_none() && !player.is_dead())
            .map(Player::id)
            .collect();

        let mut spawned = Vec::with_capacity(waiting.len());
        for player in waiting {
            let position = self.board.choose_spawn_tile(placement, &mut self.rng)?;
            let tank_color = color.pick(&mut self.rng);
            spawned.push(self.create_tank_at(caller, player, tank_color, position)?);
        }
        Ok(spawned)
    }

    /// Creates a tank for `player` on a free tile
    pub fn create_tank_at(
        &mut self,
        caller: Caller,
        player: ClientId,
        color: Rgb,
        position: GridPosition,
    ) -> Result<TankId> {
        Self::require_authority(caller, "create a tank")?;
        if self.player(player)?.tank().is_some() {
            return Err(GameError::AlreadySet("player tank"));
        }
        if self.board.tile_at(position.x, position.y)?.is_occupied() {
            return Err(GameError::TileOccupied(position));
        }

        let id = TankId(self.next_tank_id);
        self.next_tank_id += 1;

        let mut tank = Tank::new(id);
        tank.set_owner(caller, player)?;
        tank.set_color(caller, color)?;
        self.board
            .tile_at_mut(position.x, position.y)?
            .set_occupying_tank(caller, id)?;
        tank.set_grid_position(caller, position)?;
        self.tanks.insert(id, tank);

        if let Some(owner) = self.players.get_mut(&player) {
            owner.set_tank(caller, id)?;
        }

        info!("Spawned tank {} for player {} at {}", id, player, position);
        self.events.publish(StateEvent::TankSpawned {
            tank: id,
            owner: player,
            color,
            position,
        });
        Ok(id)
    }

    // Tanks

    /// Moves a tank, vacating its old tile and occupying the new one
    pub fn move_tank(&mut self, caller: Caller, id: TankId, x: i32, y: i32) -> Result<()> {
        Self::require_authority(caller, "move a tank")?;
        let from = self.tank(id)?.grid_position();
        let to = GridPosition::new(x, y);

        let destination = self.board.tile_at(x, y)?;
        if destination.is_occupied() {
            if destination.occupying_tank()? == id {
                return Ok(());
            }
            return Err(GameError::TileOccupied(to));
        }

        if let Some(from) = from {
            self.board.tile_at_mut(from.x, from.y)?.remove_tank(caller)?;
        }
        self.board.tile_at_mut(x, y)?.set_occupying_tank(caller, id)?;
        if let Some(tank) = self.tanks.get_mut(&id) {
            tank.set_grid_position(caller, to)?;
        }

        debug!("Tank {} moved from {:?} to {}", id, from, to);
        self.events.publish(StateEvent::TankMoved { tank: id, from, to });
        Ok(())
    }

    /// Trades one action point for one range; false when no point is left
    pub fn upgrade_range(&mut self, caller: Caller, id: TankId) -> Result<bool> {
        let tank = self.tanks.get_mut(&id).ok_or(GameError::UnknownTank(id))?;
        if !tank.upgrade_range(caller)? {
            return Ok(false);
        }

        let stats = tank.stats();
        debug!("Tank {} upgraded range to {}", id, stats.range);
        self.events.publish(StateEvent::TankStatsChanged { tank: id, stats });
        Ok(true)
    }

    /// Damages a tank, destroying it at zero health; returns whether it was destroyed
    pub fn apply_damage(&mut self, caller: Caller, id: TankId, amount: i32) -> Result<bool> {
        let tank = self.tanks.get_mut(&id).ok_or(GameError::UnknownTank(id))?;
        let destroyed = tank.apply_damage(caller, amount)?;
        let stats = tank.stats();
        self.events.publish(StateEvent::TankStatsChanged { tank: id, stats });

        if destroyed {
            self.destroy_tank(caller, id)?;
        }
        Ok(destroyed)
    }

    /// Removes a tank from its tile and the arena; its owner dies
    ///
    /// Destroying a tank that no longer exists does nothing and returns false.
    pub fn destroy_tank(&mut self, caller: Caller, id: TankId) -> Result<bool> {
        Self::require_authority(caller, "destroy a tank")?;
        let Some(tank) = self.tanks.remove(&id) else {
            return Ok(false);
        };

        if let Some(position) = tank.grid_position() {
            let tile = self.board.tile_at_mut(position.x, position.y)?;
            if tile.occupying_tank().ok() == Some(id) {
                tile.remove_tank(caller)?;
            }
        }

        info!("Tank {} destroyed", id);
        self.events.publish(StateEvent::TankDestroyed { tank: id });

        if let Some(owner) = tank.owner() {
            if self.players.contains_key(&owner) {
                self.mark_player_dead(caller, owner)?;
            }
        }
        Ok(true)
    }

    // Game

    /// Builds the map, spawns everyone, starts the timer and activates the game
    ///
    /// Returns false without doing anything when `caller` is not the authority
    /// or the game is already running.
    pub fn start_game(&mut self, caller: Caller) -> Result<bool> {
        if !caller.is_authority() {
            debug!("Ignoring start request from {}", caller);
            return Ok(false);
        }
        if self.is_active() {
            warn!("Start requested but the game is already active");
            return Ok(false);
        }

        if !self.board.is_constructed() {
            self.construct_map(caller)?;
        }
        let (placement, color) = (self.config.placement, self.config.color);
        let spawned = self.spawn_players(caller, placement, color)?;

        self.game.timer_mut().start();
        self.game.activate(caller)?;

        info!("Game started with {} tanks", spawned.len());
        self.events.publish(StateEvent::GameStarted);
        self.events.publish(StateEvent::Notice {
            text: "The game has started".to_string(),
            color: None,
        });
        Ok(true)
    }

    /// Advances the action-point timer by `elapsed`; returns true if points were granted
    pub fn tick(&mut self, caller: Caller, elapsed: Duration) -> Result<bool> {
        Self::require_authority(caller, "advance the game timer")?;
        if !self.game.timer_mut().tick(elapsed) {
            return Ok(false);
        }
        self.grant_action_points(caller)?;
        Ok(true)
    }

    fn grant_action_points(&mut self, caller: Caller) -> Result<()> {
        let mut granted = Vec::with_capacity(self.tanks.len());
        for tank in self.tanks.values_mut() {
            tank.grant_action_point(caller)?;
            granted.push((tank.id(), tank.stats()));
        }

        info!("Granted an action point to {} tanks", granted.len());
        for (tank, stats) in granted {
            self.events.publish(StateEvent::TankStatsChanged { tank, stats });
        }
        self.events.publish(StateEvent::ActionPointsGranted);
        self.events.publish(StateEvent::Notice {
            text: "Action points granted".to_string(),
            color: None,
        });
        Ok(())
    }

    // Requests made on behalf of a connected player

    /// The live tank controlled by `client`
    pub fn controlled_tank(&self, client: ClientId) -> Result<TankId> {
        let player = self.player(client)?;
        player
            .tank()
            .filter(|tank| !player.is_dead() && self.tanks.contains_key(tank))
            .ok_or(GameError::NotOwner { client })
    }

    /// Moves the client's tank one tile for one action point
    pub fn request_move(&mut self, client: ClientId, x: i32, y: i32) -> Result<()> {
        let id = self.controlled_tank(client)?;
        let tank = self.tank(id)?;
        let to = GridPosition::new(x, y);

        let destination = self.board.tile_at(x, y)?;
        let adjacent = tank
            .grid_position()
            .map_or(false, |from| from.chebyshev_distance(to) == 1);
        if !adjacent {
            return Err(GameError::OutOfRange {
                tank: id,
                target: format!("tile {}", to),
            });
        }
        if destination.is_occupied() {
            return Err(GameError::TileOccupied(to));
        }
        if tank.stats().action_points < 1 {
            return Err(GameError::InsufficientActionPoints(id));
        }

        self.spend_action_point(id)?;
        self.move_tank(Caller::Authority, id, x, y)
    }

    pub fn request_upgrade_range(&mut self, client: ClientId) -> Result<bool> {
        let id = self.controlled_tank(client)?;
        self.upgrade_range(Caller::Authority, id)
    }

    /// Fires at another tank in range for one action point
    pub fn request_attack(&mut self, client: ClientId, target: TankId) -> Result<bool> {
        let id = self.controlled_tank(client)?;
        let attacker = self.tank(id)?;
        let victim = self.tank(target)?;

        if target == id || !attacker.in_range_of(victim) {
            return Err(GameError::OutOfRange {
                tank: id,
                target: format!("tank {}", target),
            });
        }
        if attacker.stats().action_points < 1 {
            return Err(GameError::InsufficientActionPoints(id));
        }

        self.spend_action_point(id)?;
        info!("Tank {} hit tank {}", id, target);
        self.apply_damage(Caller::Authority, target, ATTACK_DAMAGE)
    }

    fn spend_action_point(&mut self, id: TankId) -> Result<()> {
        let tank = self.tanks.get_mut(&id).ok_or(GameError::UnknownTank(id))?;
        tank.spend_action_point(Caller::Authority)?;
        let stats = tank.stats();
        self.events.publish(StateEvent::TankStatsChanged { tank: id, stats });
        Ok(())
    }

    /// Full copy of the observable state, for observers that join late
    pub fn snapshot(&self) -> Snapshot {
        let active = self.is_active();
        let (width, height) = self.board.size();

        Snapshot {
            active,
            width,
            height,
            constructed: self.board.is_constructed(),
            timer_remaining: self.game.timer().remaining_secs(),
            timer_running: self.game.timer().is_running(),
            players: self
                .players
                .values()
                .map(|player| PlayerView {
                    id: player.id(),
                    name: player.screen_name().to_string(),
                    tank: player.tank().filter(|tank| self.tanks.contains_key(tank)),
                    alive: player.is_alive(active),
                })
                .collect(),
            tanks: self
                .tanks
                .values()
                .map(|tank| TankView {
                    id: tank.id(),
                    owner: tank.owner(),
                    color: tank.color(),
                    position: tank.grid_position(),
                    stats: tank.stats(),
                })
                .collect(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
