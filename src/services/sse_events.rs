use std::{sync::Arc, time::SystemTime};

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        format_system_time,
        session::{ITEM_IMAGE_PATH, PlayerSummary},
        sse::{
            AnswerSubmittedEvent, EVENT_ANSWER_SUBMITTED, EVENT_ITEM_LOADED, EVENT_SCORE_UPDATED,
            EVENT_SESSION_ENDED, EVENT_SESSION_STARTED, EVENT_TICK, ItemLoadedEvent,
            ScoreUpdatedEvent, ServerEvent, SessionEndedEvent, SessionStartedEvent, TickEvent,
        },
    },
    state::{
        SseHub,
        event_bus::{EventBus, EventKind, GameEvent},
    },
};

/// Forward every bus event to the SSE hub as a named event.
pub fn register(bus: &EventBus, hub: SseHub) {
    bus.subscribe_many(
        &EventKind::ALL,
        Arc::new(move |event: &GameEvent| {
            if let Some(server_event) = to_server_event(event) {
                hub.broadcast(server_event);
            }
        }),
    );
}

/// Serialise a bus event into its SSE form.
pub fn to_server_event(event: &GameEvent) -> Option<ServerEvent> {
    match event {
        GameEvent::PlayerSessionStarted { player } => encode(
            EVENT_SESSION_STARTED,
            &SessionStartedEvent {
                player: player.into(),
            },
        ),
        GameEvent::ItemLoaded { item } => encode(
            EVENT_ITEM_LOADED,
            &ItemLoadedEvent {
                image_url: ITEM_IMAGE_PATH.to_string(),
                image_size: item.image().len(),
            },
        ),
        GameEvent::AnswerSubmitted {
            value,
            correct,
            player,
        } => encode(
            EVENT_ANSWER_SUBMITTED,
            &AnswerSubmittedEvent {
                value: *value,
                correct: *correct,
                player: player.into(),
            },
        ),
        GameEvent::ScoreUpdated { player } => encode(
            EVENT_SCORE_UPDATED,
            &ScoreUpdatedEvent {
                player: PlayerSummary::from(player),
            },
        ),
        GameEvent::SessionEnded { player, summary } => encode(
            EVENT_SESSION_ENDED,
            &SessionEndedEvent {
                player: player.into(),
                score: summary.score,
                attempts: summary.attempts,
                accuracy: summary.accuracy,
                passed: summary.passed,
                ended_at: format_system_time(SystemTime::now()),
            },
        ),
        GameEvent::Tick { remaining } => {
            let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
            encode(
                EVENT_TICK,
                &TickEvent {
                    remaining_ms,
                    remaining_secs: remaining_ms.div_ceil(1_000),
                },
            )
        }
    }
}

fn encode<T: Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(name.to_string(), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialise SSE payload");
            None
        }
    }
}
