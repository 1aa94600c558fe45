//! Bus observer that records answers and finished rounds in the player store.
//!
//! Handlers run on the coordinator loop, so they only enqueue work; a single
//! worker task performs the storage calls in publication order. Failures are
//! logged and dropped. [`ResultsRecorder::flush`] waits for the queue to
//! drain so a new round reads the stats written by the previous one.

use std::{sync::Arc, time::SystemTime};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{PlayerStatsEntity, SessionResultEntity},
    state::{
        StoreSlot,
        event_bus::{EventBus, EventKind, GameEvent, Subscriber, SubscriptionId},
    },
};

#[derive(Debug)]
enum PersistJob {
    Ranking(PlayerStatsEntity),
    RoundFinished {
        stats: PlayerStatsEntity,
        result: SessionResultEntity,
    },
    Flush(oneshot::Sender<()>),
}

impl PersistJob {
    fn from_event(event: &GameEvent) -> Option<Self> {
        match event {
            GameEvent::AnswerSubmitted { player, .. } => {
                Some(PersistJob::Ranking(PlayerStatsEntity::from(player)))
            }
            GameEvent::SessionEnded { player, summary } => Some(PersistJob::RoundFinished {
                stats: PlayerStatsEntity::from(player),
                result: SessionResultEntity {
                    id: Uuid::new_v4(),
                    username: player.username.clone(),
                    score: summary.score,
                    accuracy: summary.accuracy,
                    attempts: summary.attempts,
                    played_at: SystemTime::now(),
                },
            }),
            _ => None,
        }
    }
}

/// Enqueues persistence work for graded answers and finished rounds.
#[derive(Clone)]
pub struct ResultsRecorder {
    jobs: mpsc::UnboundedSender<PersistJob>,
}

impl ResultsRecorder {
    /// Start the storage worker reading the store from `slot` on every job.
    pub fn spawn(slot: StoreSlot) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, slot));
        Self { jobs }
    }

    /// Subscribe to the events that trigger persistence.
    pub fn register(&self, bus: &EventBus) -> SubscriptionId {
        bus.subscribe_many(
            &[EventKind::AnswerSubmitted, EventKind::SessionEnded],
            Arc::new(self.clone()),
        )
    }

    /// Wait until every job enqueued so far has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.jobs.send(PersistJob::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }
}

impl Subscriber for ResultsRecorder {
    fn handle(&self, event: &GameEvent) {
        let Some(job) = PersistJob::from_event(event) else {
            return;
        };
        if self.jobs.send(job).is_err() {
            warn!("persistence worker stopped; dropping job");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<PersistJob>, slot: StoreSlot) {
    while let Some(job) = rx.recv().await {
        if let PersistJob::Flush(done) = job {
            let _ = done.send(());
            continue;
        }
        let Some(store) = slot.get().await else {
            warn!(job = ?job, "no player store installed (degraded mode); dropping job");
            continue;
        };

        match job {
            PersistJob::Ranking(stats) => {
                let username = stats.username.clone();
                if let Err(err) = store.update_ranking(stats).await {
                    warn!(%username, error = %err, "failed to update ranking");
                }
            }
            PersistJob::RoundFinished { stats, result } => {
                let username = stats.username.clone();
                if let Err(err) = store.save_player(stats).await {
                    warn!(%username, error = %err, "failed to save player");
                }
                let score = result.score;
                match store.save_session_result(result).await {
                    Ok(()) => debug!(%username, score, "session result saved"),
                    Err(err) => warn!(%username, error = %err, "failed to save session result"),
                }
            }
            PersistJob::Flush(_) => {}
        }
    }
    debug!("persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{
            models::UserEntity,
            player_store::{PlayerStore, memory::MemoryPlayerStore},
        },
        state::session::{Player, SessionSummary},
    };

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn player(score: u32, attempts: u32) -> Player {
        Player {
            username: "alice".into(),
            total_score: score,
            correct_answers: score,
            total_attempts: attempts,
        }
    }

    #[tokio::test]
    async fn answers_and_round_end_are_persisted_in_order() {
        let store = MemoryPlayerStore::new();
        store
            .register_user(UserEntity {
                username: "alice".into(),
                password_hash: "digest".into(),
                created_at: SystemTime::now(),
                last_login: None,
            })
            .await
            .unwrap();
        let slot = StoreSlot::default();
        slot.set(Some(Arc::new(store.clone()))).await;

        let bus = EventBus::new();
        ResultsRecorder::spawn(slot).register(&bus);

        bus.publish(&GameEvent::AnswerSubmitted {
            value: 4,
            correct: true,
            player: player(1, 1),
        });
        bus.publish(&GameEvent::AnswerSubmitted {
            value: 2,
            correct: false,
            player: player(1, 2),
        });
        bus.publish(&GameEvent::SessionEnded {
            player: player(1, 2),
            summary: SessionSummary {
                score: 1,
                attempts: 2,
                accuracy: 50.0,
                passed: true,
            },
        });

        wait_until(|| {
            let store = store.clone();
            async move { store.result_count("alice") == 1 }
        })
        .await;

        let saved = store.load_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(saved.stats.total_attempts, 2);
        assert_eq!(saved.stats.total_score, 1);
        assert_eq!(saved.games_played, 1);
        assert_eq!(saved.best_session_score, 1);
    }

    #[tokio::test]
    async fn flush_waits_for_queued_round_results() {
        let store = MemoryPlayerStore::new();
        let slot = StoreSlot::default();
        slot.set(Some(Arc::new(store.clone()))).await;

        let bus = EventBus::new();
        let recorder = ResultsRecorder::spawn(slot);
        recorder.register(&bus);

        bus.publish(&GameEvent::SessionEnded {
            player: player(3, 4),
            summary: SessionSummary {
                score: 3,
                attempts: 4,
                accuracy: 75.0,
                passed: true,
            },
        });
        recorder.flush().await;

        let saved = store.load_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(saved.stats.total_score, 3);
        assert_eq!(saved.games_played, 1);
        assert_eq!(store.result_count("alice"), 1);
    }

    #[tokio::test]
    async fn flush_returns_without_a_store() {
        let recorder = ResultsRecorder::spawn(StoreSlot::default());
        tokio::time::timeout(Duration::from_secs(1), recorder.flush())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn jobs_are_dropped_without_a_store() {
        let slot = StoreSlot::default();
        let bus = EventBus::new();
        ResultsRecorder::spawn(slot.clone()).register(&bus);

        bus.publish(&GameEvent::AnswerSubmitted {
            value: 1,
            correct: true,
            player: player(1, 1),
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // installing a store later does not replay dropped work
        let store = MemoryPlayerStore::new();
        slot.set(Some(Arc::new(store.clone()))).await;
        assert!(store.load_player("alice".into()).await.unwrap().is_none());
    }

    #[test]
    fn unrelated_events_produce_no_job() {
        let event = GameEvent::Tick {
            remaining: Duration::from_secs(1),
        };
        assert!(PersistJob::from_event(&event).is_none());
    }
}
