//! Maps round events to named sound cues for the presentation layer.
//!
//! Cues are fire-and-forget: they are pushed on the SSE stream as `sound`
//! events and nothing waits for them to be played.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tracing::debug;

use crate::{
    dto::sse::{EVENT_SOUND, ServerEvent, SoundEvent},
    state::{
        SseHub,
        event_bus::{EventBus, EventKind, GameEvent, Subscriber},
    },
};

const NO_SECOND: u64 = u64::MAX;

/// Named sound played by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// The answer was right.
    Correct,
    /// The answer was wrong.
    Wrong,
    /// Another whole second elapsed.
    Tick,
    /// The round was passed.
    Achievement,
    /// The round was failed.
    GameOver,
}

impl SoundCue {
    /// Identifier sent to the client.
    pub fn name(self) -> &'static str {
        match self {
            SoundCue::Correct => "correct",
            SoundCue::Wrong => "wrong",
            SoundCue::Tick => "tick",
            SoundCue::Achievement => "achievement",
            SoundCue::GameOver => "gameover",
        }
    }
}

/// Bus observer emitting sound cues.
pub struct SoundCues {
    hub: SseHub,
    muted: AtomicBool,
    last_second: AtomicU64,
}

impl SoundCues {
    /// Observer broadcasting on `hub`, optionally starting muted.
    pub fn new(hub: SseHub, muted: bool) -> Self {
        Self {
            hub,
            muted: AtomicBool::new(muted),
            last_second: AtomicU64::new(NO_SECOND),
        }
    }

    /// Build the observer and subscribe it to the kinds that produce cues.
    pub fn register(bus: &EventBus, hub: SseHub, muted: bool) -> Arc<Self> {
        let cues = Arc::new(Self::new(hub, muted));
        bus.subscribe_many(
            &[
                EventKind::PlayerSessionStarted,
                EventKind::AnswerSubmitted,
                EventKind::SessionEnded,
                EventKind::Tick,
            ],
            cues.clone(),
        );
        cues
    }

    /// Mute or unmute every later cue.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Whether cues are currently muted.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Cue matching `event`, if any. Ticks only produce a cue when the whole
    /// second shown to the player changes.
    pub fn cue_for(&self, event: &GameEvent) -> Option<SoundCue> {
        match event {
            GameEvent::PlayerSessionStarted { .. } => {
                self.last_second.store(NO_SECOND, Ordering::Relaxed);
                None
            }
            GameEvent::AnswerSubmitted { correct: true, .. } => Some(SoundCue::Correct),
            GameEvent::AnswerSubmitted { correct: false, .. } => Some(SoundCue::Wrong),
            GameEvent::SessionEnded { summary, .. } if summary.passed => {
                Some(SoundCue::Achievement)
            }
            GameEvent::SessionEnded { .. } => Some(SoundCue::GameOver),
            GameEvent::Tick { remaining } => {
                let millis = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
                let second = millis.div_ceil(1_000);
                if second == 0 {
                    return None;
                }
                let previous = self.last_second.swap(second, Ordering::Relaxed);
                (previous != second).then_some(SoundCue::Tick)
            }
            GameEvent::ItemLoaded { .. } | GameEvent::ScoreUpdated { .. } => None,
        }
    }
}

impl Subscriber for SoundCues {
    fn handle(&self, event: &GameEvent) {
        let Some(cue) = self.cue_for(event) else {
            return;
        };
        if self.is_muted() {
            return;
        }

        debug!(cue = cue.name(), "sound cue");
        if let Ok(event) = ServerEvent::json(EVENT_SOUND.to_string(), &SoundEvent { cue: cue.name() })
        {
            self.hub.broadcast(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::session::{Player, SessionSummary};

    fn tick(millis: u64) -> GameEvent {
        GameEvent::Tick {
            remaining: Duration::from_millis(millis),
        }
    }

    fn ended(passed: bool) -> GameEvent {
        GameEvent::SessionEnded {
            player: Player::new("alice"),
            summary: SessionSummary {
                score: 1,
                attempts: 2,
                accuracy: 50.0,
                passed,
            },
        }
    }

    #[test]
    fn ticks_fire_once_per_second() {
        let cues = SoundCues::new(SseHub::new(4), false);
        let fired: Vec<_> = [3_000, 2_900, 2_050, 2_000, 1_950, 1_000, 400, 0]
            .into_iter()
            .filter_map(|ms| cues.cue_for(&tick(ms)))
            .collect();
        // 3s, 2s, 1s; zero never ticks
        assert_eq!(fired, vec![SoundCue::Tick; 3]);
    }

    #[test]
    fn new_round_resets_the_tick_tracker() {
        let cues = SoundCues::new(SseHub::new(4), false);
        assert_eq!(cues.cue_for(&tick(5_000)), Some(SoundCue::Tick));
        assert_eq!(cues.cue_for(&tick(5_000)), None);
        cues.cue_for(&GameEvent::PlayerSessionStarted {
            player: Player::new("alice"),
        });
        assert_eq!(cues.cue_for(&tick(5_000)), Some(SoundCue::Tick));
    }

    #[test]
    fn end_of_round_cue_depends_on_verdict() {
        let cues = SoundCues::new(SseHub::new(4), false);
        assert_eq!(cues.cue_for(&ended(true)), Some(SoundCue::Achievement));
        assert_eq!(cues.cue_for(&ended(false)), Some(SoundCue::GameOver));
    }

    #[tokio::test]
    async fn cues_are_forwarded_unless_muted() {
        let hub = SseHub::new(4);
        let mut receiver = hub.subscribe();
        let bus = EventBus::new();
        let cues = SoundCues::register(&bus, hub, false);

        let answer = GameEvent::AnswerSubmitted {
            value: 3,
            correct: false,
            player: Player::new("alice"),
        };
        bus.publish(&answer);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_SOUND));
        assert_eq!(event.data, r#"{"cue":"wrong"}"#);

        cues.set_muted(true);
        bus.publish(&answer);
        assert!(receiver.try_recv().is_err());
    }
}
