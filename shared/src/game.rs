use crate::error::Result;
use crate::replicated::{Caller, Replicated, SubscriptionId, WritePermission};
use std::time::Duration;

pub const DEFAULT_ACTION_POINT_PERIOD: Duration = Duration::from_secs(10);

/// Cooperative countdown that hands out action points
///
/// The owner feeds it elapsed monotonic time. However far the countdown
/// overshoots, one call to `tick` expires it at most once.
#[derive(Debug, Clone)]
pub struct ActionPointTimer {
    period: Duration,
    remaining: f32,
    running: bool,
}

impl ActionPointTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            remaining: period.as_secs_f32(),
            running: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn remaining_secs(&self) -> f32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts a fresh countdown
    pub fn start(&mut self) {
        self.remaining = self.period.as_secs_f32();
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advances the countdown; returns true when it expired and restarted
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.running {
            return false;
        }

        self.remaining -= elapsed.as_secs_f32();
        if self.remaining <= 0.0 {
            self.remaining = self.period.as_secs_f32();
            return true;
        }
        false
    }

    /// Remaining time as `minutes:seconds`
    pub fn format_remaining(&self) -> String {
        format_countdown(self.remaining)
    }
}

/// Formats seconds as `m:ss`, rounding up and never going negative
pub fn format_countdown(seconds: f32) -> String {
    let total = seconds.max(0.0).ceil() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Session-wide game state: whether play has started, and the turn timer
#[derive(Debug)]
pub struct Game {
    active: Replicated<bool>,
    timer: ActionPointTimer,
}

impl Game {
    pub fn new(action_point_period: Duration) -> Self {
        Self {
            active: Replicated::new("game active", false, WritePermission::Authority),
            timer: ActionPointTimer::new(action_point_period),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub fn timer(&self) -> &ActionPointTimer {
        &self.timer
    }

    pub(crate) fn timer_mut(&mut self) -> &mut ActionPointTimer {
        &mut self.timer
    }

    /// Flips the game to active; returns false if it already was
    pub(crate) fn activate(&mut self, caller: Caller) -> Result<bool> {
        if self.is_active() {
            return Ok(false);
        }
        self.active.write(caller, true)?;
        Ok(true)
    }

    pub fn subscribe_active(&mut self, observer: impl FnMut(&bool, &bool) + Send + 'static) -> SubscriptionId {
        self.active.subscribe(observer)
    }
}
