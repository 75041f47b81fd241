use crate::error::Result;
use crate::replicated::{Caller, Replicated, SubscriptionId, WritePermission};
use crate::{ClientId, TankId};
use log::debug;

/// Longest screen name kept, in characters
pub const MAX_NAME_LENGTH: usize = 32;

/// A connection-scoped participant in the session
#[derive(Debug)]
pub struct Player {
    id: ClientId,
    screen_name: Replicated<String>,
    tank: Replicated<Option<TankId>>,
    dead: Replicated<bool>,
}

impl Player {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            screen_name: Replicated::new(
                "screen name",
                format!("Player {}", id),
                WritePermission::OwnerOnly,
            )
            .owned_by(id),
            tank: Replicated::new("player tank", None, WritePermission::Authority),
            dead: Replicated::new("player dead", false, WritePermission::Authority),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn screen_name(&self) -> &str {
        self.screen_name.read()
    }

    /// Renames the player if `caller` is the player's own connection
    ///
    /// The name is trimmed and cut to [`MAX_NAME_LENGTH`] characters. Any
    /// other caller, or a blank name, is ignored rather than rejected.
    /// Returns whether the name was written.
    pub fn set_name(&mut self, caller: Caller, name: &str) -> bool {
        let name: String = name.trim().chars().take(MAX_NAME_LENGTH).collect();
        if name.is_empty() {
            return false;
        }

        match self.screen_name.write(caller, name) {
            Ok(()) => true,
            Err(e) => {
                debug!("Ignoring rename of player {}: {}", self.id, e);
                false
            }
        }
    }

    pub fn tank(&self) -> Option<TankId> {
        *self.tank.read()
    }

    pub fn set_tank(&mut self, caller: Caller, tank: TankId) -> Result<()> {
        self.tank.set_once(caller, tank)
    }

    /// Whether the player has been eliminated or has left
    pub fn is_dead(&self) -> bool {
        *self.dead.read()
    }

    /// A player is alive until eliminated, and once the game runs only with a tank
    pub fn is_alive(&self, game_active: bool) -> bool {
        if self.is_dead() {
            return false;
        }
        self.tank().is_some() || !game_active
    }

    /// Latches the dead flag; returns false if the player was already dead
    pub(crate) fn mark_dead(&mut self, caller: Caller) -> Result<bool> {
        if self.is_dead() {
            return Ok(false);
        }
        self.dead.write(caller, true)?;
        Ok(true)
    }

    pub fn subscribe_name(
        &mut self,
        observer: impl FnMut(&String, &String) + Send + 'static,
    ) -> SubscriptionId {
        self.screen_name.subscribe(observer)
    }

    pub fn subscribe_dead(&mut self, observer: impl FnMut(&bool, &bool) + Send + 'static) -> SubscriptionId {
        self.dead.subscribe(observer)
    }
}
