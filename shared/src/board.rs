//! Tile grid owned by the session
//!
//! Tiles are stored row-major from the bottom-left corner: the tile at grid
//! coordinate `(x, y)` lives at index `x + y * width`. The grid is built once
//! by [`Board::construct_map`]; its size can only change before that.

use crate::error::{GameError, Result};
use crate::replicated::{check_permission, Caller, Replicated, SubscriptionId, WritePermission};
use crate::tile::Tile;
use crate::{GridPosition, MAX_BOARD_SIZE};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Attempts made to find a free tile before a spawn gives up
pub const MAX_PLACEMENT_TRIES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl FromStr for Axis {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x" | "horizontal" | "width" => Ok(Axis::X),
            "y" | "vertical" | "height" => Ok(Axis::Y),
            other => Err(GameError::InvalidAxis(other.to_string())),
        }
    }
}

/// How spawn tiles are chosen for new tanks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlacementPolicy {
    /// Uniformly random tile off the outer ring, retried while occupied
    #[default]
    RandomInterior,
}

impl FromStr for PlacementPolicy {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "random-interior" => Ok(PlacementPolicy::RandomInterior),
            other => Err(GameError::InvalidPolicy(other.to_string())),
        }
    }
}

/// World-space rectangle covered by the board
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
}

fn clamp_size(size: i32) -> i32 {
    size.clamp(1, MAX_BOARD_SIZE)
}

#[derive(Debug)]
pub struct Board {
    width: Replicated<i32>,
    height: Replicated<i32>,
    tile_scale: f32,
    tile_gap: f32,
    tiles: Vec<Tile>,
}

impl Board {
    pub fn new(width: i32, height: i32, tile_scale: f32, tile_gap: f32) -> Self {
        Self {
            width: Replicated::new("board width", clamp_size(width), WritePermission::Authority),
            height: Replicated::new("board height", clamp_size(height), WritePermission::Authority),
            tile_scale: tile_scale.max(f32::EPSILON),
            tile_gap: tile_gap.max(0.0),
            tiles: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        *self.width.read()
    }

    pub fn height(&self) -> i32 {
        *self.height.read()
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width(), self.height())
    }

    pub fn tile_gap(&self) -> f32 {
        self.tile_gap
    }

    pub fn is_constructed(&self) -> bool {
        !self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Grows or shrinks one axis within `1..=MAX_BOARD_SIZE` tiles
    pub fn change_size(&mut self, caller: Caller, axis: Axis, delta: i32) -> Result<i32> {
        check_permission(WritePermission::Authority, None, caller, "resize the board")?;
        if self.is_constructed() {
            return Err(GameError::AlreadyConstructed);
        }

        let field = match axis {
            Axis::X => &mut self.width,
            Axis::Y => &mut self.height,
        };
        let new_size = clamp_size(field.read().saturating_add(delta));
        field.write(caller, new_size)?;
        Ok(new_size)
    }

    pub fn subscribe_size(
        &mut self,
        axis: Axis,
        observer: impl FnMut(&i32, &i32) + Send + 'static,
    ) -> SubscriptionId {
        match axis {
            Axis::X => self.width.subscribe(observer),
            Axis::Y => self.height.subscribe(observer),
        }
    }

    /// Builds every tile of the grid, bottom row first
    pub fn construct_map(&mut self, caller: Caller) -> Result<()> {
        check_permission(WritePermission::Authority, None, caller, "construct the map")?;
        if self.is_constructed() {
            return Err(GameError::AlreadyConstructed);
        }

        let (width, height) = self.size();
        let count = usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .filter(|_| width <= MAX_BOARD_SIZE && height <= MAX_BOARD_SIZE)
            .ok_or(GameError::BoardTooLarge { width, height })?;
        let mut tiles = Vec::with_capacity(count);
        for y in 0..height {
            for x in 0..width {
                let mut tile = Tile::new();
                tile.set_grid_position(caller, x, y)?;
                tiles.push(tile);
            }
        }
        self.tiles = tiles;

        info!("Constructed {}x{} board", width, height);
        Ok(())
    }

    fn index_of(&self, x: i32, y: i32) -> Result<usize> {
        let (width, height) = self.size();
        if x < 0 || x >= width || y < 0 || y >= height {
            return Err(GameError::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        if !self.is_constructed() {
            return Err(GameError::NotConstructed);
        }
        Ok((x + y * width) as usize)
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Result<&Tile> {
        let index = self.index_of(x, y)?;
        Ok(&self.tiles[index])
    }

    pub fn tile_at_mut(&mut self, x: i32, y: i32) -> Result<&mut Tile> {
        let index = self.index_of(x, y)?;
        Ok(&mut self.tiles[index])
    }

    pub fn contains(&self, position: GridPosition) -> bool {
        let (width, height) = self.size();
        (0..width).contains(&position.x) && (0..height).contains(&position.y)
    }

    /// Rectangle covered by the tiles, centred on the origin
    pub fn bounds(&self) -> Bounds {
        let step = self.tile_scale + self.tile_gap;
        let span_x = self.width() as f32 * step - self.tile_gap;
        let span_y = self.height() as f32 * step - self.tile_gap;

        Bounds {
            start_x: -span_x / 2.0,
            start_y: -span_y / 2.0,
            end_x: span_x / 2.0,
            end_y: span_y / 2.0,
        }
    }

    /// World-space centre of the tile at `position`
    pub fn tile_center(&self, position: GridPosition) -> (f32, f32) {
        let bounds = self.bounds();
        let step = self.tile_scale + self.tile_gap;
        let half = self.tile_scale / 2.0;

        (
            bounds.start_x + half + position.x as f32 * step,
            bounds.start_y + half + position.y as f32 * step,
        )
    }

    /// Picks a free tile for a new tank according to `policy`
    pub fn choose_spawn_tile<R: Rng + ?Sized>(
        &self,
        policy: PlacementPolicy,
        rng: &mut R,
    ) -> Result<GridPosition> {
        if !self.is_constructed() {
            return Err(GameError::NotConstructed);
        }

        match policy {
            PlacementPolicy::RandomInterior => {
                let (width, height) = self.size();
                // Boards narrower than three tiles have no interior
                if width < 3 || height < 3 {
                    return Err(GameError::PlacementExhausted(0));
                }

                for _ in 0..MAX_PLACEMENT_TRIES {
                    let x = rng.gen_range(1..width - 1);
                    let y = rng.gen_range(1..height - 1);
                    if !self.tile_at(x, y)?.is_occupied() {
                        return Ok(GridPosition::new(x, y));
                    }
                }
                Err(GameError::PlacementExhausted(MAX_PLACEMENT_TRIES))
            }
        }
    }
}
