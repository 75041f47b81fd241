use crate::color::Rgb;
use crate::error::{GameError, Result};
use crate::replicated::{Caller, Replicated, SubscriptionId, WritePermission};
use crate::{ClientId, GridPosition, TankId};
use serde::{Deserialize, Serialize};

pub const INITIAL_HEALTH: i32 = 3;
pub const INITIAL_ACTION_POINTS: i32 = 1;
pub const INITIAL_RANGE: i32 = 1;

/// Mutable combat figures of a tank
///
/// Kept in one replicated value so that a change touching several figures
/// (spending a point to gain range) reaches observers as a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankStats {
    pub health: i32,
    pub action_points: i32,
    pub range: i32,
}

impl Default for TankStats {
    fn default() -> Self {
        Self {
            health: INITIAL_HEALTH,
            action_points: INITIAL_ACTION_POINTS,
            range: INITIAL_RANGE,
        }
    }
}

/// A mobile unit bound to one player
#[derive(Debug)]
pub struct Tank {
    id: TankId,
    owner: Replicated<Option<ClientId>>,
    color: Replicated<Option<Rgb>>,
    stats: Replicated<TankStats>,
    position: Replicated<Option<GridPosition>>,
}

impl Tank {
    pub fn new(id: TankId) -> Self {
        Self {
            id,
            owner: Replicated::new("tank owner", None, WritePermission::Authority),
            color: Replicated::new("tank color", None, WritePermission::Authority),
            stats: Replicated::new("tank stats", TankStats::default(), WritePermission::Authority),
            position: Replicated::new("tank position", None, WritePermission::Authority),
        }
    }

    pub fn id(&self) -> TankId {
        self.id
    }

    pub fn owner(&self) -> Option<ClientId> {
        *self.owner.read()
    }

    pub fn set_owner(&mut self, caller: Caller, player: ClientId) -> Result<()> {
        self.owner.set_once(caller, player)
    }

    pub fn color(&self) -> Option<Rgb> {
        *self.color.read()
    }

    pub fn set_color(&mut self, caller: Caller, color: Rgb) -> Result<()> {
        self.color.set_once(caller, color)
    }

    pub fn stats(&self) -> TankStats {
        *self.stats.read()
    }

    pub fn grid_position(&self) -> Option<GridPosition> {
        *self.position.read()
    }

    /// Records the tile the tank stands on; tile occupancy is the board's job
    pub(crate) fn set_grid_position(&mut self, caller: Caller, position: GridPosition) -> Result<()> {
        self.position.write(caller, Some(position))
    }

    /// Spends one action point for one extra range
    ///
    /// Returns false without changing anything when no action point is left.
    pub fn upgrade_range(&mut self, caller: Caller) -> Result<bool> {
        let mut stats = self.stats();
        if !self.stats.can_write(caller) {
            return Err(GameError::permission("upgrade a tank's range", caller));
        }
        if stats.action_points < 1 {
            return Ok(false);
        }

        stats.action_points -= 1;
        stats.range += 1;
        self.stats.write(caller, stats)?;
        Ok(true)
    }

    pub fn grant_action_point(&mut self, caller: Caller) -> Result<()> {
        let mut stats = self.stats();
        stats.action_points += 1;
        self.stats.write(caller, stats)
    }

    pub fn spend_action_point(&mut self, caller: Caller) -> Result<()> {
        if !self.stats.can_write(caller) {
            return Err(GameError::permission("spend a tank's action points", caller));
        }
        let mut stats = self.stats();
        if stats.action_points < 1 {
            return Err(GameError::InsufficientActionPoints(self.id));
        }
        stats.action_points -= 1;
        self.stats.write(caller, stats)
    }

    /// Reduces health and reports whether the tank should now be destroyed
    pub fn apply_damage(&mut self, caller: Caller, amount: i32) -> Result<bool> {
        let mut stats = self.stats();
        stats.health -= amount;
        self.stats.write(caller, stats)?;
        Ok(stats.health <= 0)
    }

    pub(crate) fn replace_stats(&mut self, caller: Caller, stats: TankStats) -> Result<()> {
        self.stats.write(caller, stats)
    }

    /// True when `other` lies inside the square of radius `range` around this tank
    pub fn in_range_of(&self, other: &Tank) -> bool {
        match (self.grid_position(), other.grid_position()) {
            (Some(from), Some(to)) => from.chebyshev_distance(to) <= self.stats().range,
            _ => false,
        }
    }

    pub fn subscribe_stats(
        &mut self,
        observer: impl FnMut(&TankStats, &TankStats) + Send + 'static,
    ) -> SubscriptionId {
        self.stats.subscribe(observer)
    }

    pub fn unsubscribe_stats(&mut self, id: SubscriptionId) -> bool {
        self.stats.unsubscribe(id)
    }

    pub fn subscribe_position(
        &mut self,
        observer: impl FnMut(&Option<GridPosition>, &Option<GridPosition>) + Send + 'static,
    ) -> SubscriptionId {
        self.position.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tank_at(id: u32, x: i32, y: i32) -> Tank {
        let mut tank = Tank::new(TankId(id));
        tank.set_grid_position(Caller::Authority, GridPosition::new(x, y))
            .unwrap();
        tank
    }

    #[test]
    fn test_initial_stats() {
        let tank = Tank::new(TankId(1));
        assert_eq!(
            tank.stats(),
            TankStats {
                health: 3,
                action_points: 1,
                range: 1
            }
        );
        assert_eq!(tank.owner(), None);
        assert_eq!(tank.color(), None);
    }

    #[test]
    fn test_owner_and_color_set_once() {
        let mut tank = Tank::new(TankId(1));
        tank.set_owner(Caller::Authority, 4).unwrap();
        tank.set_color(Caller::Authority, Rgb::new(1, 2, 3)).unwrap();

        assert_eq!(
            tank.set_owner(Caller::Authority, 5),
            Err(GameError::AlreadySet("tank owner"))
        );
        assert_eq!(
            tank.set_color(Caller::Authority, Rgb::new(0, 0, 0)),
            Err(GameError::AlreadySet("tank color"))
        );
        assert!(tank.set_owner(Caller::Client(4), 4).is_err());
        assert_eq!(tank.owner(), Some(4));
    }

    #[test]
    fn test_upgrade_range_without_points_is_noop() {
        let mut tank = Tank::new(TankId(1));
        tank.spend_action_point(Caller::Authority).unwrap();

        assert_eq!(tank.upgrade_range(Caller::Authority), Ok(false));
        assert_eq!(tank.stats().action_points, 0);
        assert_eq!(tank.stats().range, 1);
    }

    #[test]
    fn test_upgrade_range_is_one_notification() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let mut tank = Tank::new(TankId(1));
        tank.grant_action_point(Caller::Authority).unwrap();

        let sink = Arc::clone(&updates);
        tank.subscribe_stats(move |old, new| sink.lock().unwrap().push((*old, *new)));

        assert_eq!(tank.upgrade_range(Caller::Authority), Ok(true));

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        let (old, new) = updates[0];
        assert_eq!((old.action_points, old.range), (2, 1));
        assert_eq!((new.action_points, new.range), (1, 2));
    }

    #[test]
    fn test_client_cannot_upgrade() {
        let mut tank = Tank::new(TankId(1));
        assert!(matches!(
            tank.upgrade_range(Caller::Client(1)),
            Err(GameError::Permission { .. })
        ));
        assert_eq!(tank.stats(), TankStats::default());
    }

    #[test]
    fn test_spend_without_points_fails() {
        let mut tank = Tank::new(TankId(3));
        tank.spend_action_point(Caller::Authority).unwrap();
        assert_eq!(
            tank.spend_action_point(Caller::Authority),
            Err(GameError::InsufficientActionPoints(TankId(3)))
        );
    }

    #[test]
    fn test_apply_damage_reports_destruction() {
        let mut tank = Tank::new(TankId(1));
        assert_eq!(tank.apply_damage(Caller::Authority, 1), Ok(false));
        assert_eq!(tank.apply_damage(Caller::Authority, 2), Ok(true));
        assert_eq!(tank.stats().health, 0);
    }

    #[test]
    fn test_in_range_is_square_neighbourhood() {
        let tank = tank_at(1, 3, 3);

        assert!(tank.in_range_of(&tank_at(2, 4, 4)));
        assert!(tank.in_range_of(&tank_at(2, 2, 3)));
        assert!(!tank.in_range_of(&tank_at(2, 5, 3)));
        assert!(!tank.in_range_of(&tank_at(2, 3, 1)));
        assert!(!tank.in_range_of(&Tank::new(TankId(9))));
    }

    #[test]
    fn test_range_uses_observer_range() {
        let mut long = tank_at(1, 0, 0);
        long.replace_stats(
            Caller::Authority,
            TankStats {
                range: 3,
                ..TankStats::default()
            },
        )
        .unwrap();
        let short = tank_at(2, 3, 2);

        assert!(long.in_range_of(&short));
        assert!(!short.in_range_of(&long));
    }
}
