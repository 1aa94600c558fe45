//! In-process publish/subscribe registry for round lifecycle events.
//!
//! Subscribers are invoked synchronously, in registration order, on the task
//! that publishes. The coordinator is the only publisher, so every handler
//! runs on the coordinator loop and must not block: anything slow (storage,
//! network) is spawned from inside the handler.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::session::{Player, PuzzleItem, SessionSummary};

/// Discriminant used to route events to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new round started.
    PlayerSessionStarted,
    /// A puzzle became available.
    ItemLoaded,
    /// An answer was graded.
    AnswerSubmitted,
    /// Cumulative player stats changed.
    ScoreUpdated,
    /// The round terminated.
    SessionEnded,
    /// Countdown observation for presentation.
    Tick,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        EventKind::PlayerSessionStarted,
        EventKind::ItemLoaded,
        EventKind::AnswerSubmitted,
        EventKind::ScoreUpdated,
        EventKind::SessionEnded,
        EventKind::Tick,
    ];
}

/// State transitions published by the coordinator.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A round started for `player`.
    PlayerSessionStarted {
        /// Player owning the round.
        player: Player,
    },
    /// A fresh puzzle is now the current item.
    ItemLoaded {
        /// The loaded puzzle.
        item: PuzzleItem,
    },
    /// An answer was graded against the current item.
    AnswerSubmitted {
        /// Submitted value.
        value: i32,
        /// Grading verdict.
        correct: bool,
        /// Player stats after grading.
        player: Player,
    },
    /// Cumulative player stats changed.
    ScoreUpdated {
        /// Player stats after the change.
        player: Player,
    },
    /// The round terminated. Published exactly once per round.
    SessionEnded {
        /// Player stats at termination.
        player: Player,
        /// Round results.
        summary: SessionSummary,
    },
    /// Countdown observation.
    Tick {
        /// Time left in the round.
        remaining: Duration,
    },
}

impl GameEvent {
    /// Routing key of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::PlayerSessionStarted { .. } => EventKind::PlayerSessionStarted,
            GameEvent::ItemLoaded { .. } => EventKind::ItemLoaded,
            GameEvent::AnswerSubmitted { .. } => EventKind::AnswerSubmitted,
            GameEvent::ScoreUpdated { .. } => EventKind::ScoreUpdated,
            GameEvent::SessionEnded { .. } => EventKind::SessionEnded,
            GameEvent::Tick { .. } => EventKind::Tick,
        }
    }
}

/// Observer of [`GameEvent`]s.
pub trait Subscriber: Send + Sync {
    /// React to one event. Must return quickly.
    fn handle(&self, event: &GameEvent);
}

impl<F> Subscriber for F
where
    F: Fn(&GameEvent) + Send + Sync,
{
    fn handle(&self, event: &GameEvent) {
        self(event)
    }
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type Registry = IndexMap<EventKind, Vec<(SubscriptionId, Arc<dyn Subscriber>)>>;

/// Registry mapping event kinds to ordered subscriber lists.
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for a single kind.
    pub fn subscribe(
        &self,
        kind: EventKind,
        subscriber: Arc<dyn Subscriber>,
    ) -> SubscriptionId {
        self.subscribe_many(&[kind], subscriber)
    }

    /// Register `subscriber` for several kinds under a single id.
    pub fn subscribe_many(
        &self,
        kinds: &[EventKind],
        subscriber: Arc<dyn Subscriber>,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        for kind in kinds {
            registry
                .entry(*kind)
                .or_default()
                .push((id, subscriber.clone()));
        }
        id
    }

    /// Remove every registration made under `id`. Returns whether any existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for subscribers in registry.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|(existing, _)| *existing != id);
            removed |= subscribers.len() != before;
        }
        removed
    }

    /// Deliver `event` to every subscriber currently registered for its kind.
    ///
    /// The list is snapshotted before dispatch; changes made by handlers take
    /// effect from the next publish.
    pub fn publish(&self, event: &GameEvent) {
        let snapshot: Vec<Arc<dyn Subscriber>> = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            match registry.get(&event.kind()) {
                Some(subscribers) => subscribers.iter().map(|(_, s)| s.clone()).collect(),
                None => return,
            }
        };

        for subscriber in snapshot {
            subscriber.handle(event);
        }
    }
}
