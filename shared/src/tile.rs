use crate::error::{GameError, Result};
use crate::replicated::{Caller, Replicated, SubscriptionId, WritePermission};
use crate::{GridPosition, TankId};

/// A single cell of the board
///
/// Occupancy is stored as the occupying tank's handle, so "occupied" and
/// "has an occupying tank" can never disagree.
#[derive(Debug)]
pub struct Tile {
    grid_position: Replicated<Option<GridPosition>>,
    occupant: Replicated<Option<TankId>>,
}

impl Tile {
    pub fn new() -> Self {
        Self {
            grid_position: Replicated::new(
                "tile grid position",
                None,
                WritePermission::Authority,
            ),
            occupant: Replicated::new("tile occupant", None, WritePermission::Authority),
        }
    }

    /// Grid position of the tile, `None` until the board assigns it
    pub fn grid_position(&self) -> Option<GridPosition> {
        *self.grid_position.read()
    }

    pub fn set_grid_position(&mut self, caller: Caller, x: i32, y: i32) -> Result<()> {
        self.grid_position.set_once(caller, GridPosition::new(x, y))
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.read().is_some()
    }

    pub fn occupying_tank(&self) -> Result<TankId> {
        self.occupant
            .read()
            .ok_or_else(|| GameError::NotOccupied(self.position_or_unset()))
    }

    /// Places a tank on the tile; the previous occupant must be removed first
    pub fn set_occupying_tank(&mut self, caller: Caller, tank: TankId) -> Result<()> {
        if !self.occupant.can_write(caller) {
            return Err(GameError::permission("set a tile's occupying tank", caller));
        }
        if self.is_occupied() {
            return Err(GameError::AlreadyOccupied(self.position_or_unset()));
        }
        self.occupant.write(caller, Some(tank))
    }

    /// Clears occupancy; removing from an empty tile is a no-op
    pub fn remove_tank(&mut self, caller: Caller) -> Result<()> {
        self.occupant.write(caller, None)
    }

    pub fn subscribe_occupant(
        &mut self,
        observer: impl FnMut(&Option<TankId>, &Option<TankId>) + Send + 'static,
    ) -> SubscriptionId {
        self.occupant.subscribe(observer)
    }

    pub fn unsubscribe_occupant(&mut self, id: SubscriptionId) -> bool {
        self.occupant.unsubscribe(id)
    }

    fn position_or_unset(&self) -> GridPosition {
        self.grid_position().unwrap_or(GridPosition::UNSET)
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_grid_position_set_exactly_once() {
        let mut tile = Tile::new();
        assert_eq!(tile.grid_position(), None);

        tile.set_grid_position(Caller::Authority, 2, 3).unwrap();
        assert_eq!(tile.grid_position(), Some(GridPosition::new(2, 3)));

        assert_eq!(
            tile.set_grid_position(Caller::Authority, 4, 4),
            Err(GameError::AlreadySet("tile grid position"))
        );
    }

    #[test]
    fn test_client_cannot_set_grid_position() {
        let mut tile = Tile::new();
        assert!(matches!(
            tile.set_grid_position(Caller::Client(1), 0, 0),
            Err(GameError::Permission { .. })
        ));
    }

    #[test]
    fn test_occupy_and_remove() {
        let mut tile = Tile::new();
        tile.set_grid_position(Caller::Authority, 1, 1).unwrap();

        assert!(!tile.is_occupied());
        assert_eq!(
            tile.occupying_tank(),
            Err(GameError::NotOccupied(GridPosition::new(1, 1)))
        );

        tile.set_occupying_tank(Caller::Authority, TankId(5)).unwrap();
        assert!(tile.is_occupied());
        assert_eq!(tile.occupying_tank(), Ok(TankId(5)));

        tile.remove_tank(Caller::Authority).unwrap();
        assert!(!tile.is_occupied());
    }

    #[test]
    fn test_double_occupation_rejected() {
        let mut tile = Tile::new();
        tile.set_grid_position(Caller::Authority, 0, 0).unwrap();
        tile.set_occupying_tank(Caller::Authority, TankId(1)).unwrap();

        assert_eq!(
            tile.set_occupying_tank(Caller::Authority, TankId(2)),
            Err(GameError::AlreadyOccupied(GridPosition::new(0, 0)))
        );
        assert_eq!(tile.occupying_tank(), Ok(TankId(1)));
    }

    #[test]
    fn test_remove_tank_is_idempotent() {
        let changes = Arc::new(Mutex::new(0));
        let mut tile = Tile::new();
        tile.set_occupying_tank(Caller::Authority, TankId(1)).unwrap();

        let sink = Arc::clone(&changes);
        tile.subscribe_occupant(move |_, _| *sink.lock().unwrap() += 1);

        tile.remove_tank(Caller::Authority).unwrap();
        tile.remove_tank(Caller::Authority).unwrap();

        assert_eq!(*changes.lock().unwrap(), 1);
    }

    #[test]
    fn test_client_cannot_touch_occupancy() {
        let mut tile = Tile::new();
        assert!(tile.set_occupying_tank(Caller::Client(1), TankId(1)).is_err());
        assert!(tile.remove_tank(Caller::Client(1)).is_err());
    }
}
