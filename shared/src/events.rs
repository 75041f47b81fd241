//! Composite state events and the bus that publishes them
//!
//! Field-level observers on [`crate::replicated::Replicated`] see one value at
//! a time. Session operations that touch several entities publish a single
//! [`StateEvent`] once all of their writes are committed, so subscribers never
//! see, for example, a tank standing on two tiles.

use crate::color::Rgb;
use crate::replicated::SubscriptionId;
use crate::tank::TankStats;
use crate::{ClientId, GridPosition, TankId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEvent {
    PlayerJoined {
        player: ClientId,
        name: String,
    },
    PlayerLeft {
        player: ClientId,
    },
    NameChanged {
        player: ClientId,
        name: String,
    },
    BoardResized {
        width: i32,
        height: i32,
    },
    MapConstructed {
        width: i32,
        height: i32,
    },
    TankSpawned {
        tank: TankId,
        owner: ClientId,
        color: Rgb,
        position: GridPosition,
    },
    TankMoved {
        tank: TankId,
        from: Option<GridPosition>,
        to: GridPosition,
    },
    TankStatsChanged {
        tank: TankId,
        stats: TankStats,
    },
    TankDestroyed {
        tank: TankId,
    },
    PlayerDied {
        player: ClientId,
    },
    GameStarted,
    ActionPointsGranted,
    /// Informational line for the in-game feed, drawn in the neutral
    /// color when `color` is unset
    Notice {
        text: String,
        color: Option<Rgb>,
    },
}

/// Coarse grouping used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Players,
    Board,
    Tanks,
    Game,
    Info,
}

impl StateEvent {
    pub fn topic(&self) -> Topic {
        match self {
            StateEvent::PlayerJoined { .. }
            | StateEvent::PlayerLeft { .. }
            | StateEvent::NameChanged { .. }
            | StateEvent::PlayerDied { .. } => Topic::Players,
            StateEvent::BoardResized { .. } | StateEvent::MapConstructed { .. } => Topic::Board,
            StateEvent::TankSpawned { .. }
            | StateEvent::TankMoved { .. }
            | StateEvent::TankStatsChanged { .. }
            | StateEvent::TankDestroyed { .. } => Topic::Tanks,
            StateEvent::GameStarted | StateEvent::ActionPointsGranted => Topic::Game,
            StateEvent::Notice { .. } => Topic::Info,
        }
    }
}

type Subscriber = Box<dyn FnMut(&StateEvent) + Send>;

/// Synchronous publish/subscribe dispatcher
///
/// Subscribers run in registration order, on the publishing thread, before
/// `publish` returns.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Option<Topic>, Subscriber)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to one topic, or to everything when `topic` is `None`
    pub fn subscribe(
        &mut self,
        topic: Option<Topic>,
        subscriber: impl FnMut(&StateEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, topic, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: StateEvent) {
        let topic = event.topic();
        for (_, filter, subscriber) in self.subscribers.iter_mut() {
            if filter.map_or(true, |wanted| wanted == topic) {
                subscriber(&event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
